use std::path::PathBuf;

use thiserror::Error;

use crate::ports::StoreError;

/// ディレクトリの zip 化に失敗した
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("walk {path:?} failed: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("i/o on {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("archive task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// バックアップ元 1 件の処理に失敗した
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("source path does not exist: {0:?}")]
    SourceMissing(PathBuf),

    #[error("cannot inspect source {path:?}: {source}")]
    SourceMetadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create staging directory: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// スケジュール時刻の設定が不正
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule time is not configured")]
    Missing,

    #[error("schedule time must be HH:MM, got {0:?}")]
    Format(String),

    #[error("schedule time out of range: {0:?}")]
    OutOfRange(String),
}
