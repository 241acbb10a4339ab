// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`OperationPlan`] per-repository decision (spec.md §3, §4.6).

use serde::{Deserialize, Serialize};

/// The action the Bulk Operation Engine decided to take for one repository,
/// per the decision table in spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationAction {
    /// Clone the repository fresh.
    Clone,
    /// Fast-forward pull an existing clean clone.
    Pull,
    /// Do nothing; `reason` explains why.
    Skip,
    /// Delete the local clone and clone fresh (requires `force` +
    /// confirmation).
    ForceReclone,
    /// The remote is gone but a local clone exists; keep it and warn.
    WarnDeleteLocal,
}

/// A per-repository decision produced while planning a bulk run, owned by
/// the Bulk Operation Engine for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPlan {
    /// The decided action.
    pub action: OperationAction,
    /// A one-line human-readable reason (e.g. `"dirty"`, `"not-a-repo"`,
    /// `"disabled"`).
    pub reason: String,
    /// A rough estimate of how many file changes executing this plan is
    /// expected to produce, when known in advance (e.g. from a prior
    /// `diff_tree` preview). `None` when no estimate is available.
    pub expected_changes: Option<u32>,
}

impl OperationPlan {
    /// Construct a plan with no change estimate.
    #[must_use]
    pub fn new(action: OperationAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
            expected_changes: None,
        }
    }
}
