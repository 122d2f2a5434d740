//! Report model: summaries of one cleanup pass and one backup run.
//!
//! These are plain data: the app layer fills them in while it works and the
//! CLI prints them (human-readable or JSON).

use serde::{Deserialize, Serialize};

use super::decision::{CleanupDecision, SkipReason};

/// A deletion that was attempted and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub key: String,
    pub error: String,
}

/// Aggregate counts of a cleanup pass.
///
/// Every examined key lands in exactly one bucket:
/// deleted, failed, planned (dry-run) or one of the three skip counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub examined: usize,
    pub deleted: usize,
    pub failed: usize,

    /// Delete decisions not carried out because the pass was a dry run.
    #[serde(default)]
    pub planned: usize,

    pub skipped_unrecognized: usize,
    pub skipped_retained: usize,
    pub skipped_whitelisted: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DeleteFailure>,
}

impl CleanupReport {
    pub fn skipped(&self) -> usize {
        self.skipped_unrecognized + self.skipped_retained + self.skipped_whitelisted
    }

    pub(crate) fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::UnrecognizedFormat => self.skipped_unrecognized += 1,
            SkipReason::WithinRetentionWindow => self.skipped_retained += 1,
            SkipReason::Whitelisted => self.skipped_whitelisted += 1,
        }
    }

    pub(crate) fn record_failure(&mut self, key: impl Into<String>, error: impl Into<String>) {
        self.failed += 1;
        self.failures.push(DeleteFailure {
            key: key.into(),
            error: error.into(),
        });
    }

    /// Count a decision that needs no store call.
    pub(crate) fn record_decision(&mut self, decision: CleanupDecision, dry_run: bool) {
        match decision {
            CleanupDecision::Skip(reason) => self.record_skip(reason),
            CleanupDecision::Delete if dry_run => self.planned += 1,
            CleanupDecision::Delete => {}
        }
    }
}

/// Result of backing up one source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupEntry {
    pub fn uploaded(source: impl Into<String>, object_key: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            source: source.into(),
            object_key: Some(object_key.into()),
            size_bytes: Some(size_bytes),
            error: None,
        }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            object_key: None,
            size_bytes: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a backup run over all configured sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub entries: Vec<BackupEntry>,
}

impl BackupReport {
    pub fn push(&mut self, entry: BackupEntry) {
        self.total += 1;
        if entry.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_sums_all_reasons() {
        let mut report = CleanupReport::default();
        report.record_skip(SkipReason::UnrecognizedFormat);
        report.record_skip(SkipReason::WithinRetentionWindow);
        report.record_skip(SkipReason::WithinRetentionWindow);
        report.record_skip(SkipReason::Whitelisted);

        assert_eq!(report.skipped(), 4);
        assert_eq!(report.skipped_retained, 2);
    }

    #[test]
    fn dry_run_delete_counts_as_planned() {
        let mut report = CleanupReport::default();
        report.record_decision(CleanupDecision::Delete, true);
        report.record_decision(CleanupDecision::Delete, false);
        assert_eq!(report.planned, 1);
        assert_eq!(report.deleted, 0);
    }

    #[test]
    fn backup_report_tracks_success_and_failure() {
        let mut report = BackupReport::default();
        report.push(BackupEntry::uploaded("/data/a", "backups/a_20251021_095449.zip", 42));
        report.push(BackupEntry::failed("/data/missing", "source path does not exist"));

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn empty_failures_are_omitted_from_json() {
        let v = serde_json::to_value(CleanupReport::default()).unwrap();
        assert!(v.get("failures").is_none());
        assert_eq!(v["deleted"], 0);
    }
}
