//! Cleanup - 期限切れアーティファクトの削除
//!
//! # フロー
//! 1. ターゲットディレクトリを一覧（`/` で終わるディレクトリマーカーは除外）
//! 2. ディレクトリからの相対名をデコード
//! 3. Decider で判定
//! 4. Delete ならフルキーで削除（失敗は記録して続行）
//!
//! すべての判定と削除の試行をログに残します。

use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::domain::{CleanupDecision, CleanupReport, Decider, decode};
use crate::ports::{ObjectStore, StoreError, dir_prefix};

/// 与えられたキーを逐次判定し、Delete のものを削除する
///
/// `keys` は `(フルキー, デコード対象の名前)` の組。
/// 削除失敗はレポートに記録され、残りのキーの処理は続きます。
pub async fn run_cleanup_pass<D, S>(
    keys: &[(String, String)],
    decider: &D,
    now: &DateTime<Local>,
    store: &S,
    dry_run: bool,
) -> CleanupReport
where
    D: Decider + ?Sized,
    S: ObjectStore + ?Sized,
{
    let mut report = CleanupReport::default();

    for (key, name) in keys {
        report.examined += 1;
        let decoded = decode(name);
        let decision = decider.decide(&decoded, now);

        match decision {
            CleanupDecision::Skip(reason) => {
                tracing::info!(
                    key = %key,
                    prefix = %decoded.prefix,
                    timestamp = %decoded.timestamp,
                    reason = %reason,
                    "skip"
                );
                report.record_decision(decision, dry_run);
            }
            CleanupDecision::Delete if dry_run => {
                tracing::info!(
                    key = %key,
                    prefix = %decoded.prefix,
                    timestamp = %decoded.timestamp,
                    "would delete (dry run)"
                );
                report.record_decision(decision, dry_run);
            }
            CleanupDecision::Delete => {
                tracing::info!(
                    key = %key,
                    prefix = %decoded.prefix,
                    timestamp = %decoded.timestamp,
                    "deleting expired artifact"
                );
                match store.delete(key).await {
                    Ok(()) => {
                        report.deleted += 1;
                        tracing::info!(key = %key, "deleted");
                    }
                    Err(e) => {
                        tracing::error!(key = %key, error = %e, "delete failed");
                        report.record_failure(key.clone(), e.to_string());
                    }
                }
            }
        }
    }

    report
}

/// CleanupPass はターゲットディレクトリ 1 つ分のクリーンアップ
pub struct CleanupPass {
    store: Arc<dyn ObjectStore>,
    decider: Arc<dyn Decider>,
    target_dir: String,
    dry_run: bool,
}

impl CleanupPass {
    pub fn new(store: Arc<dyn ObjectStore>, decider: Arc<dyn Decider>, target_dir: impl Into<String>) -> Self {
        Self {
            store,
            decider,
            target_dir: target_dir.into(),
            dry_run: false,
        }
    }

    /// 判定だけ行い、削除はしない
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// 一覧を取得して `(フルキー, 相対名)` に変換する
    ///
    /// ターゲットがバケット直下のときは、他のフォルダ配下のキーを対象にしない。
    pub async fn list_candidates(&self) -> Result<Vec<(String, String)>, StoreError> {
        let prefix = dir_prefix(&self.target_dir);
        let keys = self.store.list(&prefix).await?;
        let root = prefix.is_empty();

        Ok(keys
            .into_iter()
            .filter(|key| !key.ends_with('/'))
            .filter_map(|key| {
                let name = key.strip_prefix(prefix.as_str()).unwrap_or(&key).to_string();
                if root && name.contains('/') {
                    tracing::debug!(key = %key, "outside bucket root, ignoring");
                    return None;
                }
                Some((key, name))
            })
            .collect())
    }

    /// 一覧の取得に失敗したときだけ Err を返す
    pub async fn run(&self, now: &DateTime<Local>) -> Result<CleanupReport, StoreError> {
        tracing::info!(dir = %self.target_dir, dry_run = self.dry_run, "cleanup started");

        let candidates = self.list_candidates().await?;
        tracing::info!(count = candidates.len(), "objects to check");

        let report = run_cleanup_pass(
            &candidates,
            self.decider.as_ref(),
            now,
            self.store.as_ref(),
            self.dry_run,
        )
        .await;

        tracing::info!(
            examined = report.examined,
            deleted = report.deleted,
            failed = report.failed,
            planned = report.planned,
            skipped = report.skipped(),
            "cleanup finished"
        );
        Ok(report)
    }
}
