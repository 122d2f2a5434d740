//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **BackupRunner**: バックアップ元の圧縮とアップロード
//! - **CleanupPass**: 期限切れアーティファクトの削除
//! - **Scheduler**: 毎日のバックアップ → クリーンアップ

pub mod archive;
pub mod backup;
pub mod builder;
pub mod cleanup;
pub mod schedule;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::backup::{BackupRunner, PreparedArtifact};
pub use self::cleanup::{CleanupPass, run_cleanup_pass};
pub use self::schedule::{Cycle, Scheduler, TriggerTime, next_trigger};
