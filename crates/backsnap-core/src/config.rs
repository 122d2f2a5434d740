use std::path::PathBuf;

use config::{ConfigError, Environment};
use serde::Deserialize;

use crate::app::schedule::TriggerTime;
use crate::domain::RetentionConfig;
use crate::domain::retention::DEFAULT_MAX_AGE_DAYS;
use crate::error::ScheduleError;
use crate::observability::LogFormat;

/// 環境変数（`BACKSNAP_` prefix）から読む設定
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_force_path_style: bool,

    pub target_dir: String,
    pub sources: String,
    pub schedule_time: Option<String>,

    pub cleanup_enabled: bool,
    /// 数値にならない値は既定値に落とすので文字列のまま受ける
    pub cleanup_days: Option<String>,
    pub cleanup_whitelist: String,

    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_builder(config::Config::builder())
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let s = with_defaults(builder)?
            .add_source(Environment::with_prefix("BACKSNAP"))
            .build()?;

        s.try_deserialize()
    }

    /// カンマ区切りのバックアップ元
    pub fn source_paths(&self) -> Vec<PathBuf> {
        split_list(&self.sources).into_iter().map(PathBuf::from).collect()
    }

    pub fn whitelist(&self) -> Vec<String> {
        split_list(&self.cleanup_whitelist)
    }

    /// 保持日数。未設定・不正値・負数は 7 日。
    pub fn cleanup_days(&self) -> u32 {
        let Some(raw) = self.cleanup_days.as_deref().map(str::trim) else {
            return DEFAULT_MAX_AGE_DAYS;
        };
        if raw.is_empty() {
            return DEFAULT_MAX_AGE_DAYS;
        }
        match raw.parse::<u32>() {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!(
                    value = raw,
                    error = %e,
                    default = DEFAULT_MAX_AGE_DAYS,
                    "invalid cleanup days, using default"
                );
                DEFAULT_MAX_AGE_DAYS
            }
        }
    }

    pub fn retention_config(&self) -> RetentionConfig {
        RetentionConfig::new(self.cleanup_days(), self.whitelist())
    }

    pub fn trigger_time(&self) -> Result<TriggerTime, ScheduleError> {
        match self.schedule_time.as_deref().map(str::trim) {
            None | Some("") => Err(ScheduleError::Missing),
            Some(s) => TriggerTime::parse(s),
        }
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    builder
        .set_default("s3_force_path_style", false)?
        .set_default("target_dir", "")?
        .set_default("sources", "")?
        .set_default("cleanup_enabled", false)?
        .set_default("cleanup_whitelist", "")?
        .set_default("log_format", "pretty")
}

/// カンマで分割し、前後の空白を除去、空要素を捨てる
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
