// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit
//!
//! Fleet-scale multi-repository git orchestrator. This crate is a thin
//! facade over the per-component crates that implement each piece of
//! spec.md's architecture (§3): it re-exports their public types under one
//! name so a host application depends on a single crate, and it wires the
//! components together into [`Fleet`], the orchestration entry point a
//! CLI or service would drive.
//!
//! The components themselves live in `mgit-core`, `mgit-pattern`,
//! `mgit-provider`, `mgit-registry`, `mgit-resolver`, `mgit-git`,
//! `mgit-bulk`, `mgit-changeset`, `mgit-changes`, `mgit-events`, and
//! `mgit-retry`; see each crate's own documentation for the algorithm it
//! implements. This crate adds no new algorithms of its own.

pub use mgit_bulk::{BulkOperationEngine, BulkOptions, FailureDetail, ForceConfirmation, Outcome, Report};
pub use mgit_changes::{
    content_hash, recover_file_op, serialize_stream, validate_completion, validate_file_op, ChangePipeline,
    CompressionScheme, DiffOptions, DiffOutcome, EmbedPolicy, EmbeddedContent, RecordDiagnostic, RecoveryOutcome,
    RecoveryStrategy, ValidationIssue, ValidationLevel,
};
pub use mgit_core::{
    CancellableRun, CancellationReason, CancellationToken, ChangeOp, ChangeRecord, Changeset, CompletionRecord,
    FileOpRecord, NewChangesetRef, OperationAction, OperationPlan, PatternSpec, ProgressCounts, ProgressEvent,
    ProgressPhase, ProviderKind, Repository, RepositoryIdentity,
};
pub use mgit_error::{ErrorCategory, ErrorCode, MgitError};
pub use mgit_events::{EventBus, EventBusStats, EventSubscription};
pub use mgit_git::{diff::DiffEntry, GitExecutor};
pub use mgit_registry::ProviderRegistry;
pub use mgit_resolver::ResolutionResult;
pub use mgit_retry::{RetryDiagnostics, RetryPolicy};

use mgit_changeset::ChangesetStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level orchestration entry point: a provider registry, a git
/// executor, and a changeset-store root, wired into the three operations a
/// host application drives (resolve a pattern, run a bulk sync, emit a
/// change stream).
///
/// `Fleet` holds no per-repository state itself; it only owns the shared
/// collaborators ([`ProviderRegistry`], [`GitExecutor`]) that spec.md's
/// resolver (C4), bulk engine (C6), and change pipeline (C8) each need,
/// plus the filesystem root the changeset store persists anchors under.
pub struct Fleet {
    registry: Arc<ProviderRegistry>,
    git: Arc<GitExecutor>,
    bulk_engine: BulkOperationEngine,
    changeset_root: PathBuf,
    events: Option<Arc<EventBus>>,
}

impl Fleet {
    /// Build a fleet around a populated provider registry, discovering the
    /// system `git` binary and rooting the changeset store at
    /// `changeset_root`.
    pub fn new(registry: ProviderRegistry, changeset_root: impl Into<PathBuf>) -> Result<Self, MgitError> {
        let registry = Arc::new(registry);
        let git = Arc::new(GitExecutor::discover()?);
        let bulk_engine = BulkOperationEngine::new(Arc::clone(&registry), Arc::clone(&git));
        Ok(Self {
            registry,
            git,
            bulk_engine,
            changeset_root: changeset_root.into(),
            events: None,
        })
    }

    /// Publish progress events from bulk operations onto `bus` (spec.md
    /// §4.6 "Progress").
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bulk_engine = BulkOperationEngine::new(Arc::clone(&self.registry), Arc::clone(&self.git))
            .with_event_bus(Arc::clone(&bus));
        self.events = Some(bus);
        self
    }

    /// Resolve a three-segment pattern against the registry (spec.md C4 /
    /// §4.4).
    pub async fn resolve(
        &self,
        pattern: &PatternSpec,
        explicit_provider: Option<&str>,
        explicit_url: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ResolutionResult, MgitError> {
        mgit_resolver::resolve(&self.registry, pattern, explicit_provider, explicit_url, limit).await
    }

    /// Run a bulk clone/pull/sync over `repositories`, using
    /// `previously_known` to detect remotes that disappeared since the
    /// last resolve (spec.md C6 / §4.6).
    pub async fn bulk(
        &self,
        repositories: &[Repository],
        previously_known: &[Repository],
        options: &BulkOptions,
    ) -> Result<Report, MgitError> {
        self.bulk_engine.run(repositories, previously_known, options).await
    }

    /// Emit (and, on success, persist) the change stream for one
    /// repository checked out at `local_path` (spec.md C8 / §4.8).
    ///
    /// A fresh [`ChangePipeline`] is built per call; it owns no state
    /// beyond a [`GitExecutor`] clone and a [`ChangesetStore`] handle (a
    /// path and an uncontended mutex), so this is not a meaningful cost
    /// compared to the git subprocess calls the diff itself performs.
    pub async fn diff_changes(
        &self,
        repository: &Repository,
        local_path: &Path,
        options: &DiffOptions,
        token: Option<&CancellationToken>,
    ) -> Result<DiffOutcome, MgitError> {
        let pipeline = ChangePipeline::new((*self.git).clone(), ChangesetStore::new(&self.changeset_root));
        pipeline.diff(repository, local_path, options, token).await
    }

    /// The provider registry this fleet resolves against.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The root directory the changeset store persists anchors under.
    #[must_use]
    pub fn changeset_root(&self) -> &Path {
        &self.changeset_root
    }

    /// The event bus bulk operations publish progress to, if one was
    /// attached via [`Fleet::with_event_bus`].
    #[must_use]
    pub fn event_bus(&self) -> Option<&Arc<EventBus>> {
        self.events.as_ref()
    }
}
