#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-bulk
//!
//! The Bulk Operation Engine (spec.md C6 / §4.6): drives clone/pull/sync
//! across a resolved repository set with bounded concurrency, following the
//! decision table in §4.6. Fan-out uses the same `futures::stream::
//! FuturesUnordered` + `tokio::sync::Semaphore` shape as the resolver (C4),
//! generalized from "list repositories" to "bring one repository's working
//! tree to the desired state".

use futures::stream::{FuturesUnordered, StreamExt};
use mgit_core::{sanitize_path_segment, ProgressCounts, ProgressEvent, ProgressPhase, Repository};
use mgit_error::{ErrorCode, MgitError};
use mgit_events::EventBus;
use mgit_git::GitExecutor;
use mgit_provider::AuthScheme;
use mgit_registry::ProviderRegistry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Which subset of the decision table a run is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    /// Only `missing -> clone` transitions run; everything else is skipped.
    Clone,
    /// Only `clean -> pull` transitions run; everything else is skipped.
    Pull,
    /// The full decision table in spec.md §4.6 applies.
    Sync,
}

/// Caller-supplied acknowledgement that a destructive delete-and-reclone of
/// a *dirty* working tree may proceed. Constructing one is the only way to
/// unlock that specific transition (spec.md §4.6 "requires confirm"); there
/// is deliberately no prompt inside the engine itself.
///
/// This is a whole-run token (resolved Open Question, see DESIGN.md): one
/// confirmation covers every dirty repository the run encounters, rather
/// than a separate confirmation per repository.
#[derive(Debug, Clone)]
pub struct ForceConfirmation {
    reason: String,
}

impl ForceConfirmation {
    /// Acknowledge that dirty working trees may be deleted this run, for
    /// `reason` (surfaced in logs, never interpreted).
    #[must_use]
    pub fn acknowledge(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// The reason given when this confirmation was constructed.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Options governing one [`BulkOperationEngine::run`] call.
#[derive(Debug, Clone)]
pub struct BulkOptions {
    /// Root directory repositories are laid out under.
    pub base_path: PathBuf,
    /// Which decision-table subset applies.
    pub mode: BulkMode,
    /// Whether destructive delete-and-reclone transitions are permitted at
    /// all (clean repositories whose remote still exists, or repositories
    /// whose remote is gone).
    pub force: bool,
    /// Required alongside `force` to delete a *dirty* working tree; absent,
    /// dirty repositories are always skipped regardless of `force`.
    pub force_confirmation: Option<ForceConfirmation>,
    /// When true, no filesystem or git mutation occurs; the report
    /// describes what would have happened.
    pub dry_run: bool,
    /// Maximum in-flight repositories (spec.md §4.6: default 4, cap 20).
    pub concurrency: usize,
    /// Which credential-embedding scheme to request from each repository's
    /// driver when synthesizing a clone URL.
    pub clone_scheme: AuthScheme,
}

impl BulkOptions {
    /// Start from the spec-mandated defaults: `mode=Sync`, no force, no
    /// dry run, concurrency 4, embedded-credential clone URLs.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            mode: BulkMode::Sync,
            force: false,
            force_confirmation: None,
            dry_run: false,
            concurrency: 4,
            clone_scheme: AuthScheme::Embed,
        }
    }

    fn effective_concurrency(&self) -> usize {
        self.concurrency.clamp(1, 20)
    }
}

/// One repository's outcome for the summary report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A fresh clone was performed (or would be, under `dry_run`).
    Cloned,
    /// An existing clean checkout was fast-forwarded.
    Pulled,
    /// A dirty or stale checkout was deleted and recloned.
    DeletedAndCloned,
    /// A checkout whose remote is gone was deleted.
    DeletedLocal,
    /// No action was taken; `reason` is a short machine-stable tag.
    Skipped {
        /// Why this repository was skipped.
        reason: String,
    },
    /// The remote is gone but the local checkout was left untouched.
    WarnedKeepLocal,
}

/// A per-repository failure recorded in the final [`Report`].
#[derive(Debug, Clone)]
pub struct FailureDetail {
    /// Stable identity-hash of the failed repository.
    pub repo_key: String,
    /// One-line human-readable reason.
    pub reason: String,
}

/// Aggregate result of one bulk run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Aggregate counts across every repository processed.
    pub counts: ProgressCounts,
    /// Repositories deleted without a reclone (remote gone, force=true).
    pub deleted: u32,
    /// One entry per repository that failed.
    pub failures: Vec<FailureDetail>,
    /// Whether this report describes a dry run (no mutation occurred).
    pub dry_run: bool,
    /// Wall-clock duration of the whole run.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalState {
    Missing,
    GitClean,
    GitDirty,
    NonGitDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteState {
    Present,
    Disabled,
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Clone,
    Pull,
    DeleteThenClone,
    DeleteLocal,
    WarnKeepLocal,
    Skip(&'static str),
}

fn decide(local: LocalState, remote: RemoteState, mode: BulkMode, force: bool, has_dirty_confirmation: bool) -> Action {
    use Action::*;
    use LocalState::*;
    use RemoteState::*;

    let sync_action = match (local, remote) {
        (Missing, Present) => Clone,
        (Missing, Disabled | Gone) => Skip("nothing-to-do"),
        (GitClean, Present) => {
            if force {
                DeleteThenClone
            } else {
                Pull
            }
        }
        (GitDirty, Present) => {
            if force {
                if has_dirty_confirmation {
                    DeleteThenClone
                } else {
                    Skip("dirty-requires-confirmation")
                }
            } else {
                Skip("dirty")
            }
        }
        (NonGitDir, Present) => Skip("not-a-repo"),
        (GitClean | GitDirty, Disabled) => Skip("disabled"),
        (NonGitDir, Disabled) => Skip("not-a-repo"),
        (GitClean | GitDirty, Gone) => {
            if force {
                DeleteLocal
            } else {
                WarnKeepLocal
            }
        }
        (NonGitDir, Gone) => Skip("not-a-repo"),
    };

    match mode {
        BulkMode::Sync => sync_action,
        BulkMode::Clone => match sync_action {
            Clone => Clone,
            _ => Skip("mode-restricted-to-clone"),
        },
        BulkMode::Pull => match sync_action {
            Pull => Pull,
            _ => Skip("mode-restricted-to-pull"),
        },
    }
}

async fn local_state(git: &GitExecutor, path: &Path, inspect_timeout: Duration) -> Result<LocalState, MgitError> {
    match tokio::fs::metadata(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LocalState::Missing),
        Err(e) => Err(MgitError::new(ErrorCode::StorageError, format!("cannot stat {}: {e}", path.display()))),
        Ok(_) => {
            if !git.is_git_repository(path, inspect_timeout).await {
                return Ok(LocalState::NonGitDir);
            }
            let status = git.status_porcelain(path, inspect_timeout).await?;
            Ok(if GitExecutor::is_dirty(&status) {
                LocalState::GitDirty
            } else {
                LocalState::GitClean
            })
        }
    }
}

fn sanitized_dest(base_path: &Path, repository: &Repository) -> Result<PathBuf, MgitError> {
    let relative = repository.relative_path();
    let mut dest = base_path.to_path_buf();
    for segment in relative.iter() {
        let segment = segment.to_string_lossy();
        if !sanitize_path_segment(&segment) {
            return Err(MgitError::new(
                ErrorCode::ValidationFailed,
                format!("path segment '{segment}' is not a safe repository directory name"),
            )
            .with_context("repository", repository.identity_key()));
        }
        dest.push(segment.as_ref());
    }
    Ok(dest)
}

/// Drives clone/pull/sync across a resolved repository set.
pub struct BulkOperationEngine {
    registry: Arc<ProviderRegistry>,
    git: Arc<GitExecutor>,
    bus: Option<Arc<EventBus>>,
}

impl BulkOperationEngine {
    /// Build an engine from a provider registry (for clone URL synthesis)
    /// and a git executor.
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>, git: Arc<GitExecutor>) -> Self {
        Self { registry, git, bus: None }
    }

    /// Attach an event bus; progress events are published per spec.md §4.6
    /// "Progress".
    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Run one bulk operation over `repositories` (the currently resolved,
    /// present set). `previously_known` supplies identities the caller has
    /// seen before, used to detect the `gone` remote state for repositories
    /// no longer present in `repositories`.
    pub async fn run(
        &self,
        repositories: &[Repository],
        previously_known: &[Repository],
        options: &BulkOptions,
    ) -> Result<Report, MgitError> {
        let start = Instant::now();

        // spec.md §4.6 "Force with any deletion requires an explicit
        // confirmation signal"; §8 invariant 8. Checked once, up front,
        // for the whole run rather than per-repository: `force=true`
        // without a confirmation is a configuration error, not a set of
        // per-repo skips, so no repository's working tree is touched
        // before this returns (spec.md §8 scenario S3).
        if options.force && options.force_confirmation.is_none() {
            return Err(MgitError::new(
                ErrorCode::ConfigForceConfirmationRequired,
                "force=true requires an explicit confirmation before any deletion is issued",
            ));
        }

        if !options.dry_run {
            tokio::fs::create_dir_all(&options.base_path).await.map_err(|e| {
                MgitError::new(ErrorCode::StorageError, format!("base path {} is not writable: {e}", options.base_path.display()))
                    .with_context("path", options.base_path.display().to_string())
            })?;
        }

        let present_keys: HashSet<String> = repositories.iter().map(Repository::identity_key).collect();
        let gone: Vec<&Repository> = previously_known
            .iter()
            .filter(|r| !present_keys.contains(&r.identity_key()))
            .collect();

        let semaphore = Arc::new(Semaphore::new(options.effective_concurrency()));
        let mut in_flight = FuturesUnordered::new();

        for repository in repositories {
            let remote = if repository.disabled { RemoteState::Disabled } else { RemoteState::Present };
            in_flight.push(self.process_one(repository.clone(), remote, options, Arc::clone(&semaphore), start));
        }
        for repository in gone {
            in_flight.push(self.process_one(repository.clone(), RemoteState::Gone, options, Arc::clone(&semaphore), start));
        }

        let mut counts = ProgressCounts::default();
        let mut deleted = 0u32;
        let mut failures = Vec::new();

        while let Some((repo_key, outcome)) = in_flight.next().await {
            match outcome {
                Ok(Outcome::Cloned) => counts.cloned += 1,
                Ok(Outcome::Pulled) => counts.pulled += 1,
                Ok(Outcome::DeletedAndCloned) => {
                    counts.cloned += 1;
                    deleted += 1;
                }
                Ok(Outcome::DeletedLocal) => deleted += 1,
                Ok(Outcome::Skipped { .. } | Outcome::WarnedKeepLocal) => counts.skipped += 1,
                Err(reason) => {
                    counts.failed += 1;
                    failures.push(FailureDetail { repo_key, reason });
                }
            }
        }

        if let Some(bus) = &self.bus {
            bus.publish(ProgressEvent {
                repo_key: "*".to_string(),
                phase: ProgressPhase::Complete,
                status: "run-complete".to_string(),
                detail: None,
                counts: Some(counts),
                elapsed_ms: elapsed_ms(start),
            })
            .await;
        }

        Ok(Report {
            counts,
            deleted,
            failures,
            dry_run: options.dry_run,
            elapsed_ms: elapsed_ms(start),
        })
    }

    async fn process_one(
        &self,
        repository: Repository,
        remote: RemoteState,
        options: &BulkOptions,
        semaphore: Arc<Semaphore>,
        start: Instant,
    ) -> (String, Result<Outcome, String>) {
        let repo_key = repository.identity_key();
        let _permit = match semaphore.acquire_owned().await {
            Ok(p) => p,
            Err(_) => return (repo_key, Err("concurrency semaphore closed".to_string())),
        };

        if let Some(bus) = &self.bus {
            bus.publish(ProgressEvent::new(repo_key.clone(), ProgressPhase::Plan, "planning", elapsed_ms(start)))
                .await;
        }

        let outcome = self.process_one_inner(&repository, remote, options, start).await;
        (repo_key, outcome.map_err(|e| e.to_string()))
    }

    async fn process_one_inner(
        &self,
        repository: &Repository,
        remote: RemoteState,
        options: &BulkOptions,
        start: Instant,
    ) -> Result<Outcome, MgitError> {
        let dest = sanitized_dest(&options.base_path, repository)?;
        let local = local_state(&self.git, &dest, mgit_git::DEFAULT_INSPECT_TIMEOUT).await?;
        let has_confirmation = options.force_confirmation.is_some();
        let action = decide(local, remote, options.mode, options.force, has_confirmation);

        let outcome = match action {
            Action::Clone => {
                if !options.dry_run {
                    self.clone_into(repository, &dest, options).await?;
                }
                Outcome::Cloned
            }
            Action::Pull => {
                if !options.dry_run {
                    self.git.pull(&dest, mgit_git::DEFAULT_PULL_TIMEOUT).await?;
                }
                Outcome::Pulled
            }
            Action::DeleteThenClone => {
                if !options.dry_run {
                    tokio::fs::remove_dir_all(&dest).await.map_err(|e| {
                        MgitError::new(ErrorCode::StorageError, format!("failed to remove {}: {e}", dest.display()))
                    })?;
                    self.clone_into(repository, &dest, options).await?;
                }
                Outcome::DeletedAndCloned
            }
            Action::DeleteLocal => {
                if !options.dry_run {
                    tokio::fs::remove_dir_all(&dest).await.map_err(|e| {
                        MgitError::new(ErrorCode::StorageError, format!("failed to remove {}: {e}", dest.display()))
                    })?;
                }
                Outcome::DeletedLocal
            }
            Action::WarnKeepLocal => {
                tracing::warn!(repo = %repository.identity, "remote is gone, keeping local checkout");
                Outcome::WarnedKeepLocal
            }
            Action::Skip(reason) => Outcome::Skipped { reason: reason.to_string() },
        };

        if let Some(bus) = &self.bus {
            let status = match &outcome {
                Outcome::Cloned => "cloned",
                Outcome::Pulled => "pulled",
                Outcome::DeletedAndCloned => "deleted-and-cloned",
                Outcome::DeletedLocal => "deleted-local",
                Outcome::WarnedKeepLocal => "remote-gone",
                Outcome::Skipped { reason } => reason.as_str(),
            };
            bus.publish(ProgressEvent::new(repository.identity_key(), ProgressPhase::Complete, status, elapsed_ms(start)))
                .await;
        }

        Ok(outcome)
    }

    async fn clone_into(&self, repository: &Repository, dest: &Path, options: &BulkOptions) -> Result<(), MgitError> {
        let driver = self
            .registry
            .get_arc(repository.provider_config_name())
            .ok_or_else(|| {
                MgitError::new(ErrorCode::ConfigUnknownProvider, "no driver registered for this repository's provider configuration")
                    .with_context("provider_config_name", repository.provider_config_name().to_string())
            })?;
        let url = driver.clone_url(repository, options.clone_scheme)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MgitError::new(ErrorCode::StorageError, format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        self.git.clone(&url, dest, None, mgit_git::DEFAULT_CLONE_TIMEOUT).await
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    Duration::as_millis(&start.elapsed()) as u64
}
