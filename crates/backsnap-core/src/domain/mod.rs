//! Domain model (artifact names, retention decisions, reports).
//!
//! ドメイン層は I/O を持ちません。ストアやファイルシステムに触れるのは app 層です。

pub mod artifact_name;
pub mod decision;
pub mod report;
pub mod retention;

pub use artifact_name::{ArtifactExtension, ArtifactName, DecodedArtifact, decode, encode, encode_for_source};
pub use decision::{CleanupDecision, Decider, SkipReason};
pub use report::{BackupEntry, BackupReport, CleanupReport, DeleteFailure};
pub use retention::{RetentionConfig, RetentionPolicy, TimestampError, classify};
