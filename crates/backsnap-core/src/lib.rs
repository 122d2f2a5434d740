//! backsnap-core
//!
//! Core building blocks for scheduled backups to an object store and
//! retention-based cleanup of old artifacts.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（artifact_name, retention, decision, report）
//! - **ports**: 抽象化レイヤー（ObjectStore, Clock）
//! - **app**: アプリケーションロジック（builder, archive, backup, cleanup, schedule）
//! - **impls**: 実装（InMemoryObjectStore など開発・テスト用）
//! - **config**: 環境変数からの設定読み込み
//! - **observability**: ログ出力の初期化
//! - **error**: バックアップ・スケジュールのエラー型

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;

pub mod config;
pub mod error;
pub mod observability;
