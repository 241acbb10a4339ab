// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`ProgressEvent`] emitted by C6/C8 onto the Event Bus (spec.md §3, §4.9).

use serde::{Deserialize, Serialize};

/// Which phase of a bulk run or change emission a [`ProgressEvent`] reports
/// on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// Repository discovery/resolution is underway.
    Discover,
    /// Per-repository decisions are being planned.
    Plan,
    /// Operations are executing.
    Execute,
    /// The run (or one repository's part of it) has finished.
    Complete,
    /// The run (or one repository's part of it) failed.
    Error,
}

/// Aggregate counters carried alongside a [`ProgressEvent`] so subscribers
/// don't need to reconstruct totals by replaying the whole stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    /// Repositories cloned so far.
    pub cloned: u32,
    /// Repositories pulled so far.
    pub pulled: u32,
    /// Repositories skipped so far.
    pub skipped: u32,
    /// Repositories that failed so far.
    pub failed: u32,
}

/// A single progress update, pushed to the Event Bus as a repository
/// transitions through a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stable identity-hash of the repository this event concerns, or a
    /// run-level sentinel (e.g. `"*"`) for run-wide events.
    pub repo_key: String,
    /// Which phase this event reports on.
    pub phase: ProgressPhase,
    /// A short machine-stable status tag (e.g. `"cloning"`, `"skipped"`).
    pub status: String,
    /// An optional human-readable detail string.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
    /// Aggregate counts at the time this event was emitted, when
    /// applicable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub counts: Option<ProgressCounts>,
    /// Milliseconds elapsed since the run started.
    pub elapsed_ms: u64,
}

impl ProgressEvent {
    /// Construct an event with no detail or counts attached.
    #[must_use]
    pub fn new(repo_key: impl Into<String>, phase: ProgressPhase, status: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            repo_key: repo_key.into(),
            phase,
            status: status.into(),
            detail: None,
            counts: None,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_round_trip() {
        let ev = ProgressEvent::new("abc123", ProgressPhase::Execute, "cloning", 42);
        let json = serde_json::to_string(&ev).unwrap();
        let back: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }
}
