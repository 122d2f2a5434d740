//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryObjectStore**: 開発用・テスト用のバケット
//!
//! # 本番用実装
//! 本番用の実装は別クレートに配置します：
//! - `backsnap-s3`: S3ObjectStore（S3 互換エンドポイント全般）

pub mod memory_store;

// 主要な型を再エクスポート
pub use self::memory_store::InMemoryObjectStore;
