//! Decision model: what to do with one object found in the store.
//!
//! This module defines the CleanupDecision type (delete or skip, and why) and
//! the Decider trait (how to decide for a decoded artifact at a given time).

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::DecodedArtifact;

/// Why an object is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The key is not one of our generated names, or its timestamp cannot be read.
    UnrecognizedFormat,

    /// The artifact is not older than the retention threshold.
    WithinRetentionWindow,

    /// The artifact's prefix is protected by the whitelist.
    Whitelisted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::UnrecognizedFormat => "unrecognized-format",
            SkipReason::WithinRetentionWindow => "within-retention-window",
            SkipReason::Whitelisted => "whitelisted",
        };
        f.write_str(s)
    }
}

/// The action to take for a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum CleanupDecision {
    /// Keep the object.
    Skip(SkipReason),

    /// The object is eligible for deletion.
    Delete,
}

impl CleanupDecision {
    pub fn is_delete(&self) -> bool {
        matches!(self, CleanupDecision::Delete)
    }
}

/// Trait for deciding what to do with a decoded artifact.
///
/// Deciders are pure functions: given the decoded name and the current time,
/// they return the action without side effects other than logging.
/// The actual deletion is performed by the cleanup pass.
pub trait Decider: Send + Sync {
    /// Decide whether `artifact` should be deleted at `now`.
    fn decide(&self, artifact: &DecodedArtifact, now: &DateTime<Local>) -> CleanupDecision;
}
