//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（オブジェクトストレージ、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ドメイン層（命名・保持判定）は ports を知らない
//! - app 層が ports を受け取り、明示的に注入する（グローバル状態なし）

pub mod object_store;
pub mod clock;

// 主要な trait を再エクスポート
pub use self::object_store::{ObjectStore, StoreError, dir_prefix, join_key};
pub use self::clock::{Clock, SystemClock, FixedClock};
