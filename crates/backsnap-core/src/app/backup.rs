//! Backup - バックアップ元をアップロードする
//!
//! # フロー（1 パスごと）
//! 1. 存在確認・ファイルかディレクトリかを判定
//! 2. ディレクトリは staging ディレクトリに zip 化、ファイルはそのまま
//! 3. `<target_dir>/<正規名>` にアップロード
//! 4. `exists` でアップロードを確認（失敗しても警告のみ）
//!
//! 1 件の失敗は他のパスの処理を止めません。
//! staging ディレクトリは実行の終わりに削除されます。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::Instrument;

use crate::app::archive::zip_directory_blocking;
use crate::domain::{ArtifactName, BackupEntry, BackupReport, encode_for_source};
use crate::error::BackupError;
use crate::ports::{Clock, ObjectStore, dir_prefix, join_key};

/// アップロード前のローカル成果物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedArtifact {
    /// アップロードするローカルファイル（ファイルなら元のパス、ディレクトリなら zip）
    pub local_path: PathBuf,
    pub object_name: ArtifactName,
}

/// バックアップ元から成果物を作る
///
/// `timestamp` はローカルの壁時計時刻。
pub async fn prepare(
    source: &Path,
    staging_dir: &Path,
    timestamp: &NaiveDateTime,
) -> Result<PreparedArtifact, BackupError> {
    let metadata = match tokio::fs::metadata(source).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BackupError::SourceMissing(source.to_path_buf()));
        }
        Err(e) => {
            return Err(BackupError::SourceMetadata {
                path: source.to_path_buf(),
                source: e,
            });
        }
    };

    let is_dir = metadata.is_dir();
    let object_name = encode_for_source(source, is_dir, timestamp);

    if !is_dir {
        tracing::info!(source = %source.display(), "uploading file as-is");
        return Ok(PreparedArtifact {
            local_path: source.to_path_buf(),
            object_name,
        });
    }

    let local_path = staging_dir.join(object_name.as_str());
    tracing::info!(
        source = %source.display(),
        archive = %local_path.display(),
        "compressing directory"
    );
    let stats = zip_directory_blocking(
        source.to_path_buf(),
        local_path.clone(),
        Some(staging_dir.to_path_buf()),
    )
    .await?;
    tracing::info!(
        archive = %local_path.display(),
        files = stats.files,
        directories = stats.directories,
        bytes_in = stats.bytes_in,
        "directory compressed"
    );

    Ok(PreparedArtifact {
        local_path,
        object_name,
    })
}

/// BackupRunner は設定されたパスを順にアップロードする
pub struct BackupRunner {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    target_dir: String,
}

impl BackupRunner {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, target_dir: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            target_dir: target_dir.into(),
        }
    }

    pub fn target_dir(&self) -> &str {
        &self.target_dir
    }

    /// ターゲットディレクトリのマーカー（`<dir>/`）がなければ作る
    pub async fn ensure_target_dir(&self) -> Result<(), BackupError> {
        let marker = dir_prefix(&self.target_dir);
        if marker.is_empty() {
            return Ok(());
        }

        if self.store.exists(&marker).await? {
            tracing::info!(dir = %marker, "target directory exists");
            return Ok(());
        }

        tracing::info!(dir = %marker, "creating target directory marker");
        self.store.put_bytes(&marker, Vec::new()).await?;
        Ok(())
    }

    /// 1 パス分: 成果物を作ってアップロードし、キーとサイズを返す
    pub async fn backup_one(&self, source: &Path, staging_dir: &Path) -> Result<(String, u64), BackupError> {
        let timestamp = self.clock.now().naive_local();
        let prepared = prepare(source, staging_dir, &timestamp).await?;
        let key = join_key(&self.target_dir, prepared.object_name.as_str());

        tracing::info!(local = %prepared.local_path.display(), key = %key, "uploading");
        let size = self.store.put_file(&key, &prepared.local_path).await?;
        tracing::info!(key = %key, size_bytes = size, "upload finished");

        match self.store.exists(&key).await {
            Ok(true) => tracing::info!(key = %key, "upload verified"),
            Ok(false) => tracing::warn!(key = %key, "uploaded object not found on verification"),
            Err(e) => tracing::warn!(key = %key, error = %e, "upload verification failed"),
        }

        Ok((key, size))
    }

    /// すべてのパスを処理する。1 件の失敗で止まらない。
    pub async fn run(&self, sources: &[PathBuf]) -> BackupReport {
        let mut report = BackupReport::default();
        tracing::info!(count = sources.len(), "backup started");

        let staging = match tempfile::Builder::new().prefix("backsnap-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                let err = BackupError::Staging(e);
                tracing::error!(error = %err, "backup aborted");
                for source in sources {
                    report.push(BackupEntry::failed(source.display().to_string(), err.to_string()));
                }
                return report;
            }
        };

        for source in sources {
            let source_str = source.display().to_string();
            let span = tracing::info_span!("backup", source = %source_str);

            match self.backup_one(source, staging.path()).instrument(span).await {
                Ok((key, size)) => report.push(BackupEntry::uploaded(source_str, key, size)),
                Err(e) => {
                    tracing::error!(error = %e, "backup failed");
                    report.push(BackupEntry::failed(source_str, e.to_string()));
                }
            }
        }

        if let Err(e) = staging.close() {
            tracing::warn!(error = %e, "failed to remove staging directory");
        }

        tracing::info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            "backup finished"
        );
        report
    }
}
