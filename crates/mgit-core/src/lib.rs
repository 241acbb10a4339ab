// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-core
//!
//! The data model shared by every other mgit crate (spec.md §3) plus the
//! cooperative cancellation primitives used by the resolver, bulk engine,
//! and change pipeline (§5). This crate holds no I/O and no provider- or
//! git-specific logic; it exists so that `mgit-resolver`, `mgit-bulk`, and
//! `mgit-changes` can all talk about `Repository`, `Changeset`, and friends
//! without depending on each other.

mod cancel;
mod change_record;
mod changeset;
mod identity;
mod operation_plan;
mod progress;
mod provider_config;
mod repository;

pub use cancel::{CancellableRun, CancellationReason, CancellationToken};
pub use change_record::{
    ChangeOp, ChangeRecord, CompletionRecord, FileOpRecord, NewChangesetRef, StreamHeader, StreamHeaderLine,
};
pub use changeset::{Changeset, EMPTY_TREE_SHA};
pub use identity::{ProviderKind, RepositoryIdentity};
pub use operation_plan::{OperationAction, OperationPlan};
pub use progress::{ProgressCounts, ProgressEvent, ProgressPhase};
pub use provider_config::{Credential, ProviderConfig};
pub use repository::{sanitize_path_segment, Repository};

/// Re-exported for convenience so downstream crates can depend on
/// `mgit-core` alone for the common data-model + pattern-language surface
/// (spec.md SPEC_FULL.md "mgit-core" section).
pub use mgit_pattern::PatternSpec;
