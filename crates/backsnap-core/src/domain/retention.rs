//! Retention - 保持期間とホワイトリストによる削除判定
//!
//! # 判定順序（短絡評価）
//! 1. 正規名でない → Skip(UnrecognizedFormat)
//! 2. timestamp が読めない → Skip(UnrecognizedFormat)（削除しない側に倒す）
//! 3. 経過時間 ≤ max_age_days × 24h → Skip(WithinRetentionWindow)
//! 4. prefix がホワイトリストに完全一致 → Skip(Whitelisted)
//! 5. それ以外 → Delete
//!
//! 経過時間は日単位ではなく時間（小数）で比較します。
//! 埋め込み timestamp はローカル時刻として解釈します。

use std::collections::BTreeSet;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use super::artifact_name::TIMESTAMP_FORMAT;
use super::decision::{CleanupDecision, Decider, SkipReason};
use super::DecodedArtifact;

/// 設定がないときの保持日数
pub const DEFAULT_MAX_AGE_DAYS: u32 = 7;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// timestamp を時刻として解釈できなかった
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    #[error("invalid timestamp {timestamp:?}: {reason}")]
    Invalid { timestamp: String, reason: String },

    #[error("timestamp {0:?} does not exist in the local time zone")]
    NonexistentLocalTime(String),
}

/// クリーンアップ 1 回分の設定（パス中は不変）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub max_age_days: u32,
    pub whitelist: BTreeSet<String>,
}

impl RetentionConfig {
    pub fn new(max_age_days: u32, whitelist: impl IntoIterator<Item = String>) -> Self {
        Self {
            max_age_days,
            whitelist: whitelist.into_iter().collect(),
        }
    }

    /// 保持期間（時間）
    pub fn max_age_hours(&self) -> f64 {
        f64::from(self.max_age_days) * 24.0
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE_DAYS, Vec::new())
    }
}

/// `YYYYMMDD_HHMMSS` を `now` のタイムゾーンの壁時計時刻として解釈し、経過時間を返す
///
/// DST の重複時刻は早い方を採用します。存在しない時刻はエラーです。
pub fn age_in_hours<Tz: TimeZone>(timestamp: &str, now: &DateTime<Tz>) -> Result<f64, TimestampError> {
    let naive = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|e| {
        TimestampError::Invalid {
            timestamp: timestamp.to_string(),
            reason: e.to_string(),
        }
    })?;
    // chrono は秒 60 をうるう秒として受け付ける
    if naive.nanosecond() >= 1_000_000_000 {
        return Err(TimestampError::Invalid {
            timestamp: timestamp.to_string(),
            reason: "second out of range".to_string(),
        });
    }

    let created = now
        .timezone()
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TimestampError::NonexistentLocalTime(timestamp.to_string()))?;

    let age = now.clone().signed_duration_since(created);
    Ok(age.num_milliseconds() as f64 / MILLIS_PER_HOUR)
}

/// `max_age_days × 24` 時間を超えているか（ちょうどは超えていない）
fn exceeds_retention<Tz: TimeZone>(
    timestamp: &str,
    max_age_days: u32,
    now: &DateTime<Tz>,
) -> Result<bool, TimestampError> {
    let age = age_in_hours(timestamp, now)?;
    let older = age > f64::from(max_age_days) * 24.0;
    tracing::debug!(timestamp, age_hours = age, max_age_days, older, "computed artifact age");
    Ok(older)
}

/// `max_age_days × 24` 時間を超えているか
///
/// 解析に失敗した場合は警告を出して `false`（古くない）を返します。
pub fn is_older_than<Tz: TimeZone>(timestamp: &str, max_age_days: u32, now: &DateTime<Tz>) -> bool {
    exceeds_retention(timestamp, max_age_days, now).unwrap_or_else(|e| {
        tracing::warn!(timestamp, error = %e, "timestamp parse failed, keeping artifact");
        false
    })
}

/// 完全一致（大文字小文字を区別、前方一致やグロブはなし）
pub fn is_whitelisted<'a>(prefix: &str, whitelist: impl IntoIterator<Item = &'a String>) -> bool {
    whitelist.into_iter().any(|allowed| allowed == prefix)
}

/// 1 件分の判定
pub fn classify<Tz: TimeZone>(
    decoded: &DecodedArtifact,
    config: &RetentionConfig,
    now: &DateTime<Tz>,
) -> CleanupDecision {
    if !decoded.recognized {
        return CleanupDecision::Skip(SkipReason::UnrecognizedFormat);
    }

    match exceeds_retention(&decoded.timestamp, config.max_age_days, now) {
        Ok(true) => {}
        Ok(false) => return CleanupDecision::Skip(SkipReason::WithinRetentionWindow),
        Err(e) => {
            tracing::warn!(
                prefix = %decoded.prefix,
                timestamp = %decoded.timestamp,
                error = %e,
                "timestamp parse failed, keeping artifact"
            );
            return CleanupDecision::Skip(SkipReason::UnrecognizedFormat);
        }
    }

    if is_whitelisted(&decoded.prefix, &config.whitelist) {
        return CleanupDecision::Skip(SkipReason::Whitelisted);
    }

    CleanupDecision::Delete
}

/// RetentionConfig を保持するデフォルトの Decider
#[derive(Debug, Clone, Default)]
pub struct RetentionPolicy {
    config: RetentionConfig,
}

impl RetentionPolicy {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }
}

impl Decider for RetentionPolicy {
    fn decide(&self, artifact: &DecodedArtifact, now: &DateTime<Local>) -> CleanupDecision {
        classify(artifact, &self.config, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact_name::decode;
    use chrono::{Duration, FixedOffset, Utc};
    use rstest::rstest;

    /// 2025-10-21T10:00:00（テストは UTC の壁時計で固定）
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap()
    }

    fn config(days: u32, whitelist: &[&str]) -> RetentionConfig {
        RetentionConfig::new(days, whitelist.iter().map(|s| s.to_string()))
    }

    fn stamp(t: DateTime<Utc>) -> String {
        t.format(TIMESTAMP_FORMAT).to_string()
    }

    #[test]
    fn age_is_fractional_hours() {
        let age = age_in_hours("20251021_095000", &now()).unwrap();
        assert!((age - 10.0 / 60.0).abs() < 1e-9);

        let age = age_in_hours("20251020_095000", &now()).unwrap();
        assert!((age - (24.0 + 10.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn age_uses_wall_clock_of_now_time_zone() {
        // +09:00 の 10:00 に対して 09:00 の timestamp は 1 時間前
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tokyo.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();
        let age = age_in_hours("20251021_090000", &now).unwrap();
        assert!((age - 1.0).abs() < 1e-9);
    }

    #[test]
    fn future_timestamp_has_negative_age() {
        let age = age_in_hours("20251022_100000", &now()).unwrap();
        assert!(age < 0.0);
        assert!(!is_older_than("20251022_100000", 0, &now()));
    }

    #[rstest]
    #[case::bad_month("20251399_000000")]
    #[case::bad_hour("20251021_250000")]
    #[case::feb_30("20250230_120000")]
    #[case::garbage("not-a-timestamp")]
    #[case::leap_second("20200101_235960")]
    fn invalid_timestamp_is_an_error(#[case] timestamp: &str) {
        assert!(matches!(
            age_in_hours(timestamp, &now()),
            Err(TimestampError::Invalid { .. })
        ));
        assert!(!is_older_than(timestamp, 0, &now()));
    }

    #[test]
    fn whitelist_is_exact_match() {
        let wl = vec!["abc".to_string()];
        assert!(is_whitelisted("abc", &wl));
        assert!(!is_whitelisted("abcd", &wl));
        assert!(!is_whitelisted("ab", &wl));
        assert!(!is_whitelisted("ABC", &wl));
        assert!(!is_whitelisted(" abc", &wl));
    }

    #[rstest]
    // 具体シナリオ
    #[case::old_backup_deleted("backup_20200101_000000.zip", 7, vec![], CleanupDecision::Delete)]
    #[case::old_backup_whitelisted(
        "backup_20200101_000000.zip",
        7,
        vec!["backup"],
        CleanupDecision::Skip(SkipReason::Whitelisted)
    )]
    #[case::not_our_file("notes.txt", 7, vec![], CleanupDecision::Skip(SkipReason::UnrecognizedFormat))]
    #[case::ten_minutes_old(
        "x_20251021_095000.log",
        1,
        vec![],
        CleanupDecision::Skip(SkipReason::WithinRetentionWindow)
    )]
    #[case::twenty_five_hours_old("x_20251020_095000.log", 1, vec![], CleanupDecision::Delete)]
    // whitelist は完全一致のみ
    #[case::whitelist_longer_prefix("abcd_20200101_000000.zip", 7, vec!["abc"], CleanupDecision::Delete)]
    #[case::whitelist_shorter_prefix("ab_20200101_000000.zip", 7, vec!["abc"], CleanupDecision::Delete)]
    // 保持期間内なら whitelist より先に retention で skip
    #[case::recent_and_whitelisted(
        "backup_20251021_000000.zip",
        7,
        vec!["backup"],
        CleanupDecision::Skip(SkipReason::WithinRetentionWindow)
    )]
    #[case::zero_days_deletes_anything_past("x_20251021_095959.log", 0, vec![], CleanupDecision::Delete)]
    #[case::invalid_date_is_kept(
        "x_20251399_000000.log",
        0,
        vec![],
        CleanupDecision::Skip(SkipReason::UnrecognizedFormat)
    )]
    #[case::second_sixty_is_kept(
        "x_20200101_120060.zip",
        7,
        vec![],
        CleanupDecision::Skip(SkipReason::UnrecognizedFormat)
    )]
    fn classify_cases(
        #[case] key: &str,
        #[case] days: u32,
        #[case] whitelist: Vec<&str>,
        #[case] expected: CleanupDecision,
    ) {
        let decision = classify(&decode(key), &config(days, &whitelist), &now());
        assert_eq!(decision, expected);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let cfg = config(7, &[]);

        let exactly = decode(&format!("b_{}.zip", stamp(now() - Duration::hours(7 * 24))));
        assert_eq!(
            classify(&exactly, &cfg, &now()),
            CleanupDecision::Skip(SkipReason::WithinRetentionWindow)
        );

        let one_second_more = decode(&format!(
            "b_{}.zip",
            stamp(now() - Duration::hours(7 * 24) - Duration::seconds(1))
        ));
        assert_eq!(classify(&one_second_more, &cfg, &now()), CleanupDecision::Delete);

        let one_hour_more = decode(&format!("b_{}.zip", stamp(now() - Duration::hours(7 * 24 + 1))));
        assert_eq!(classify(&one_hour_more, &cfg, &now()), CleanupDecision::Delete);
    }

    #[test]
    fn classify_is_idempotent() {
        let cfg = config(3, &["keep"]);
        for key in [
            "keep_20200101_000000.zip",
            "drop_20200101_000000.zip",
            "fresh_20251021_000000.zip",
            "random-object.bin",
        ] {
            let decoded = decode(key);
            assert_eq!(
                classify(&decoded, &cfg, &now()),
                classify(&decoded, &cfg, &now())
            );
        }
    }

    #[test]
    fn unrecognized_names_are_never_deleted() {
        let cfg = config(0, &[]);
        for key in [
            "notes.txt",
            "",
            "backup_20200101_000000",
            "backup_2020010_000000.zip",
            "_20200101_000000.zip",
            "dir/",
            "日本語_２０２００１０１_０００００００.zip",
        ] {
            assert_eq!(
                classify(&decode(key), &cfg, &now()),
                CleanupDecision::Skip(SkipReason::UnrecognizedFormat),
                "key={key:?}"
            );
        }
    }

    #[test]
    fn retention_policy_decides_with_its_config() {
        let policy = RetentionPolicy::new(config(7, &["backup"]));
        let now = Local.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();

        assert_eq!(
            policy.decide(&decode("backup_20200101_000000.zip"), &now),
            CleanupDecision::Skip(SkipReason::Whitelisted)
        );
        assert_eq!(
            policy.decide(&decode("other_20200101_000000.zip"), &now),
            CleanupDecision::Delete
        );
    }

    #[test]
    fn default_config_keeps_seven_days() {
        let cfg = RetentionConfig::default();
        assert_eq!(cfg.max_age_days, DEFAULT_MAX_AGE_DAYS);
        assert_eq!(cfg.max_age_hours(), 168.0);
        assert!(cfg.whitelist.is_empty());
    }
}
