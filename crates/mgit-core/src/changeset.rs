// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Changeset`] persisted per-repository anchor (spec.md §3, §4.7).

use crate::identity::RepositoryIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical empty-tree SHA (`git hash-object -t tree /dev/null`),
/// used as the anchor commit when a repository has never been emitted
/// before (spec.md §4.8 step 1: "anchor is the empty tree").
pub const EMPTY_TREE_SHA: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// A persisted per-repository anchor: the last commit a change emission
/// successfully completed at. Exclusively owned by the Changeset Store;
/// mutated only on successful emission commit (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Identity of the repository this anchor belongs to.
    pub repository: RepositoryIdentity,
    /// Full commit SHA the anchor points at.
    pub commit: String,
    /// The commit's parent, if any (absent for a root commit).
    pub parent: Option<String>,
    /// Branch name the anchor was recorded against.
    pub branch: String,
    /// When this anchor was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Changeset {
    /// Construct the synthetic "first emission" anchor: the empty tree, no
    /// parent, on the given branch, timestamped `recorded_at`.
    #[must_use]
    pub fn empty_tree(
        repository: RepositoryIdentity,
        branch: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            repository,
            commit: EMPTY_TREE_SHA.to_string(),
            parent: None,
            branch: branch.into(),
            recorded_at,
        }
    }

    /// Whether this changeset is the synthetic empty-tree anchor.
    #[must_use]
    pub fn is_empty_tree(&self) -> bool {
        self.commit == EMPTY_TREE_SHA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ProviderKind;

    fn id() -> RepositoryIdentity {
        RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, "widgets")
    }

    #[test]
    fn empty_tree_anchor_has_no_parent() {
        let cs = Changeset::empty_tree(id(), "main", Utc::now());
        assert!(cs.is_empty_tree());
        assert!(cs.parent.is_none());
    }

    #[test]
    fn serde_round_trip() {
        let cs = Changeset::empty_tree(id(), "main", Utc::now());
        let json = serde_json::to_string(&cs).unwrap();
        let back: Changeset = serde_json::from_str(&json).unwrap();
        assert_eq!(cs, back);
    }
}
