//! Schedule - 毎日決まったローカル時刻にバックアップとクリーンアップを実行
//!
//! # フロー
//! 1. 次の実行時刻を計算（設定が不正なら 24 時間後）
//! 2. その時刻まで sleep
//! 3. バックアップ → クリーンアップを同期的に 1 サイクル実行（重複実行なし）
//! 4. 1 分待ってから次の時刻を再計算（同じ分に二重起動しないため）

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone};

use crate::error::ScheduleError;
use crate::ports::Clock;

/// サイクル後の待ち時間
pub const COOLDOWN: Duration = Duration::from_secs(60);

/// 設定不正時のリトライ間隔
pub const FALLBACK_DELAY_HOURS: i64 = 24;

/// 1 日の実行時刻（`HH:MM`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTime(NaiveTime);

impl TriggerTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let s = s.trim();
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| ScheduleError::Format(s.to_string()))?;
        if m.contains(':') {
            return Err(ScheduleError::Format(s.to_string()));
        }
        let hour: u32 = h.parse().map_err(|_| ScheduleError::Format(s.to_string()))?;
        let minute: u32 = m.parse().map_err(|_| ScheduleError::Format(s.to_string()))?;
        Self::new(hour, minute).ok_or_else(|| ScheduleError::OutOfRange(s.to_string()))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for TriggerTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// `now` 以降で最初の `at`（`now` と同時刻なら今日）
///
/// 当日のその時刻がローカルに存在しない（DST）場合は `now + 24h`。
pub fn next_trigger<Tz: TimeZone>(now: &DateTime<Tz>, at: TriggerTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    let candidate = tz.from_local_datetime(&today.and_time(at.time())).earliest();
    match candidate {
        Some(t) if t >= *now => t,
        Some(_) => today
            .checked_add_days(Days::new(1))
            .and_then(|tomorrow| tz.from_local_datetime(&tomorrow.and_time(at.time())).earliest())
            .unwrap_or_else(|| fallback_trigger(now)),
        None => fallback_trigger(now),
    }
}

/// 設定不正時の次回時刻
pub fn fallback_trigger<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    now.clone() + TimeDelta::hours(FALLBACK_DELAY_HOURS)
}

/// 1 サイクルの中身（バックアップ → クリーンアップ）
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run_cycle(&self);
}

/// Scheduler は Cycle を毎日実行するループ
pub struct Scheduler<C> {
    cycle: C,
    at: Result<TriggerTime, ScheduleError>,
    cooldown: Duration,
}

impl<C: Cycle> Scheduler<C> {
    pub fn new(cycle: C, at: Result<TriggerTime, ScheduleError>) -> Self {
        Self {
            cycle,
            at,
            cooldown: COOLDOWN,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// 次の実行時刻（`now` はローカル時刻）
    pub fn next_run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        match &self.at {
            Ok(at) => next_trigger(now, *at),
            Err(e) => {
                tracing::error!(error = %e, "invalid schedule time, retrying in 24h");
                fallback_trigger(now)
            }
        }
    }

    /// `shutdown` が完了するまでループする
    pub async fn run<F>(&self, clock: &dyn Clock, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let current = clock.now();
            let next = self.next_run(&current);
            let wait = (next.clone() - current.clone()).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(
                now = %current.format("%Y-%m-%d %H:%M:%S"),
                next = %next.format("%Y-%m-%d %H:%M:%S"),
                wait_secs = wait.as_secs(),
                "waiting for next run"
            );

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            self.cycle.run_cycle().await;

            tracing::info!(cooldown_secs = self.cooldown.as_secs(), "cycle finished, cooling down");
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    return;
                }
                _ = tokio::time::sleep(self.cooldown) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::Utc;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[rstest]
    #[case::morning("03:30", 3, 30)]
    #[case::midnight("00:00", 0, 0)]
    #[case::last_minute("23:59", 23, 59)]
    #[case::single_digits("7:5", 7, 5)]
    #[case::padded(" 09:15 ", 9, 15)]
    fn parse_valid(#[case] input: &str, #[case] hour: u32, #[case] minute: u32) {
        assert_eq!(TriggerTime::parse(input).unwrap(), TriggerTime::new(hour, minute).unwrap());
    }

    #[rstest]
    #[case::no_colon("0330")]
    #[case::seconds("03:30:00")]
    #[case::letters("ab:cd")]
    #[case::empty("")]
    #[case::negative("-1:00")]
    fn parse_format_errors(#[case] input: &str) {
        assert!(matches!(TriggerTime::parse(input), Err(ScheduleError::Format(_))));
    }

    #[rstest]
    #[case::hour("24:00")]
    #[case::minute("12:60")]
    fn parse_range_errors(#[case] input: &str) {
        assert!(matches!(TriggerTime::parse(input), Err(ScheduleError::OutOfRange(_))));
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(TriggerTime::new(7, 5).unwrap().to_string(), "07:05");
    }

    #[test]
    fn next_trigger_later_today() {
        let now = Utc.with_ymd_and_hms(2025, 10, 21, 1, 0, 0).unwrap();
        let next = next_trigger(&now, TriggerTime::new(3, 30).unwrap());
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 10, 21, 3, 30, 0).unwrap());
    }

    #[test]
    fn next_trigger_already_passed_goes_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 10, 31, 10, 0, 0).unwrap();
        let next = next_trigger(&now, TriggerTime::new(3, 30).unwrap());
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 11, 1, 3, 30, 0).unwrap());
    }

    #[test]
    fn next_trigger_at_exact_time_is_now() {
        let now = Utc.with_ymd_and_hms(2025, 10, 21, 3, 30, 0).unwrap();
        let next = next_trigger(&now, TriggerTime::new(3, 30).unwrap());
        assert_eq!(next, now);
    }

    #[test]
    fn invalid_schedule_falls_back_to_24h() {
        let scheduler = Scheduler::new(CountingCycle::default(), Err(ScheduleError::Missing));
        let now = Utc.with_ymd_and_hms(2025, 10, 21, 3, 30, 0).unwrap();
        assert_eq!(scheduler.next_run(&now), now + TimeDelta::hours(24));
    }

    #[derive(Default, Clone)]
    struct CountingCycle {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Cycle for CountingCycle {
        async fn run_cycle(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn loop_runs_cycle_then_stops_on_shutdown() {
        let cycle = CountingCycle::default();
        let runs = cycle.runs.clone();
        let scheduler = Scheduler::new(cycle, TriggerTime::parse("03:30"));

        // 常に 03:30 ちょうどを返すので待ち時間 0 で 1 サイクル目が走る
        let clock = FixedClock::new(chrono::Local.with_ymd_and_hms(2025, 10, 21, 3, 30, 0).unwrap());
        let shutdown = tokio::time::sleep(Duration::from_secs(30));

        scheduler.run(&clock, shutdown).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
