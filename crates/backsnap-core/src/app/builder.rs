//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - グローバル状態を持たず、ストア・時計・設定を明示的に注入する

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::app::backup::BackupRunner;
use crate::app::cleanup::CleanupPass;
use crate::app::schedule::{Cycle, Scheduler, TriggerTime};
use crate::domain::{BackupReport, CleanupReport, RetentionConfig, RetentionPolicy};
use crate::error::{BackupError, ScheduleError};
use crate::ports::{Clock, ObjectStore, StoreError, SystemClock};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .store(Arc::new(store))
///     .target_dir("backups")
///     .sources(settings.source_paths())
///     .retention(settings.retention_config())
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - store は必須。なければ BuildError::MissingStore
/// - clock は省略時 SystemClock
pub struct AppBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    clock: Option<Arc<dyn Clock>>,
    target_dir: String,
    sources: Vec<PathBuf>,
    retention: RetentionConfig,
    cleanup_enabled: bool,
    schedule: Result<TriggerTime, ScheduleError>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("object store is not configured")]
    MissingStore,
}

impl AppBuilder {
    /// 新しい AppBuilder を作成
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            target_dir: String::new(),
            sources: Vec::new(),
            retention: RetentionConfig::default(),
            cleanup_enabled: false,
            schedule: Err(ScheduleError::Missing),
        }
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn target_dir(mut self, dir: impl Into<String>) -> Self {
        self.target_dir = dir.into();
        self
    }

    pub fn sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.sources = sources;
        self
    }

    pub fn retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    pub fn cleanup_enabled(mut self, enabled: bool) -> Self {
        self.cleanup_enabled = enabled;
        self
    }

    pub fn schedule(mut self, schedule: Result<TriggerTime, ScheduleError>) -> Self {
        self.schedule = schedule;
        self
    }

    /// AppBuilder を構築して App を生成
    pub fn build(self) -> Result<App, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(App {
            backup: BackupRunner::new(store.clone(), clock.clone(), self.target_dir.clone()),
            store,
            clock,
            target_dir: self.target_dir,
            sources: self.sources,
            retention: self.retention,
            cleanup_enabled: self.cleanup_enabled,
            schedule: self.schedule,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// App はバックアップとクリーンアップを実行する
pub struct App {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    backup: BackupRunner,
    target_dir: String,
    sources: Vec<PathBuf>,
    retention: RetentionConfig,
    cleanup_enabled: bool,
    schedule: Result<TriggerTime, ScheduleError>,
}

impl App {
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    /// 起動時の準備（ターゲットディレクトリのマーカー作成）
    pub async fn prepare(&self) -> Result<(), BackupError> {
        self.backup.ensure_target_dir().await
    }

    pub async fn run_backup(&self) -> BackupReport {
        if self.sources.is_empty() {
            tracing::warn!("no backup sources configured");
        }
        self.backup.run(&self.sources).await
    }

    /// クリーンアップを 1 回実行する（cleanup_enabled は見ない）
    pub async fn run_cleanup(&self, dry_run: bool) -> Result<CleanupReport, StoreError> {
        tracing::info!(
            max_age_days = self.retention.max_age_days,
            whitelist = ?self.retention.whitelist,
            "cleanup config"
        );
        let policy = Arc::new(RetentionPolicy::new(self.retention.clone()));
        let pass = CleanupPass::new(self.store.clone(), policy, self.target_dir.clone()).dry_run(dry_run);
        pass.run(&self.clock.now()).await
    }

    /// スケジュールに従って `shutdown` まで実行し続ける
    pub async fn run_scheduled<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let scheduler = Scheduler::new(self, self.schedule.clone());
        scheduler.run(self.clock.as_ref(), shutdown).await;
    }
}

#[async_trait]
impl<'a> Cycle for &'a App {
    /// バックアップ → （有効なら）クリーンアップ
    async fn run_cycle(&self) {
        self.run_backup().await;

        if !self.cleanup_enabled {
            tracing::debug!("cleanup disabled");
            return;
        }
        if let Err(e) = self.run_cleanup(false).await {
            tracing::error!(error = %e, "cleanup failed");
        }
    }
}
