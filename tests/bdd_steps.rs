// SPDX-License-Identifier: MIT OR Apache-2.0
//! BDD-style tests covering the end-to-end scenarios in spec.md §8: the
//! multi-provider resolver (S1, S6, boundary behaviors), the bulk
//! operation engine (S2, S3), and the change pipeline (S4, S5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use cucumber::{given, then, when, World as _};
use tempfile::{tempdir, TempDir};

use mgit_bulk::{BulkOperationEngine, BulkOptions, Report};
use mgit_changes::{ChangePipeline, DiffOptions, DiffOutcome};
use mgit_changeset::ChangesetStore;
use mgit_core::{ChangeOp, ChangeRecord, ProviderKind, Repository, RepositoryIdentity};
use mgit_error::{ErrorCode, MgitError};
use mgit_git::GitExecutor;
use mgit_pattern::PatternSpec;
use mgit_provider::MockDriver;
use mgit_registry::ProviderRegistry;

/// Newtype wrapper so `cucumber::World` derive can use `Debug`; the
/// registry itself carries no useful debug representation.
struct Reg(ProviderRegistry);

impl std::fmt::Debug for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderRegistry")
    }
}

impl Default for Reg {
    fn default() -> Self {
        Self(ProviderRegistry::new())
    }
}

#[derive(Debug, Default, cucumber::World)]
struct MgitWorld {
    // --- Resolver (S1, S6, boundary behaviors) ---
    registry: Reg,
    mock_drivers: HashMap<String, Arc<MockDriver>>,
    pattern: Option<PatternSpec>,
    limit: Option<usize>,
    resolution: Option<mgit_resolver::ResolutionResult>,
    resolve_error: Option<MgitError>,

    // --- Bulk engine (S2, S3) ---
    workdir: Option<TempDir>,
    upstreams: Vec<TempDir>,
    base_path: Option<PathBuf>,
    bulk_repos: Vec<Repository>,
    bulk_options: Option<BulkOptions>,
    bulk_report: Option<Report>,
    bulk_error: Option<MgitError>,

    // --- Change pipeline (S4, S5) ---
    repo_dir: Option<TempDir>,
    store_dir: Option<TempDir>,
    repository: Option<Repository>,
    diff_outcome: Option<DiffOutcome>,
    diff_error: Option<MgitError>,
}

// ---------------------------------------------------------------------------
// Shared git helpers
// ---------------------------------------------------------------------------

fn sh_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "mgit-test")
        .env("GIT_AUTHOR_EMAIL", "mgit-test@example.com")
        .env("GIT_COMMITTER_NAME", "mgit-test")
        .env("GIT_COMMITTER_EMAIL", "mgit-test@example.com")
        .status()
        .expect("git must be installed");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(dir: &Path) {
    sh_git(dir, &["init", "--quiet", "-b", "main"]);
}

fn commit_all(dir: &Path, message: &str) {
    sh_git(dir, &["add", "-A"]);
    sh_git(dir, &["commit", "--quiet", "-m", message]);
}

fn rev_parse_head(dir: &Path) -> String {
    let output = Command::new("git").args(["rev-parse", "HEAD"]).current_dir(dir).output().expect("git rev-parse failed");
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

// ---------------------------------------------------------------------------
// Resolver — Given
// ---------------------------------------------------------------------------

fn parse_kind(s: &str) -> ProviderKind {
    match s {
        "github" => ProviderKind::GitHub,
        "azuredevops" | "azdo" => ProviderKind::AzureDevOps,
        "bitbucket" => ProviderKind::Bitbucket,
        other => ProviderKind::Custom(other.to_string()),
    }
}

fn parse_fixture(entry: &str, kind: ProviderKind, config_name: &str) -> Repository {
    let parts: Vec<&str> = entry.trim().split('/').collect();
    let identity = match parts.as_slice() {
        [org, name] => RepositoryIdentity::new(kind, config_name, *org, None, *name),
        [org, project, name] => RepositoryIdentity::new(kind, config_name, *org, Some((*project).to_string()), *name),
        _ => panic!("bad fixture spec '{entry}', expected org/name or org/project/name"),
    };
    Repository::new(identity)
}

#[given(expr = "driver {string} of kind {string} with repositories {string}")]
async fn driver_with_repos(w: &mut MgitWorld, name: String, kind: String, repos_csv: String) {
    let provider_kind = parse_kind(&kind);
    let fixtures: Vec<Repository> =
        repos_csv.split(',').map(|entry| parse_fixture(entry, provider_kind.clone(), &name)).collect();
    let driver = Arc::new(MockDriver::new(provider_kind, name.clone(), fixtures));
    w.mock_drivers.insert(name.clone(), Arc::clone(&driver));
    w.registry.0.register_arc(name, driver);
}

#[given(expr = "the pattern {string}")]
async fn set_pattern(w: &mut MgitWorld, pattern: String) {
    w.pattern = Some(PatternSpec::parse(&pattern).expect("pattern should parse"));
}

#[given(expr = "a resolution limit of {int}")]
async fn set_limit(w: &mut MgitWorld, limit: usize) {
    w.limit = Some(limit);
}

#[given(expr = "driver {string} fails the next {int} calls with rate limiting")]
async fn driver_fails_n(w: &mut MgitWorld, name: String, n: u32) {
    let driver = w.mock_drivers.get(&name).expect("driver not registered");
    driver.fail_next_n_calls_with(n, MgitError::new(ErrorCode::RateLimited, "simulated rate limit"));
}

// ---------------------------------------------------------------------------
// Resolver — When / Then
// ---------------------------------------------------------------------------

async fn resolve_now(w: &mut MgitWorld, explicit_provider: Option<String>) {
    let pattern = w.pattern.clone().expect("pattern not set");
    let limit = w.limit;
    match mgit_resolver::resolve(&w.registry.0, &pattern, explicit_provider.as_deref(), None, limit).await {
        Ok(result) => w.resolution = Some(result),
        Err(e) => w.resolve_error = Some(e),
    }
}

#[when("the pattern is resolved")]
async fn when_resolved(w: &mut MgitWorld) {
    resolve_now(w, None).await;
}

#[when(expr = "the pattern is resolved with explicit provider {string}")]
async fn when_resolved_explicit(w: &mut MgitWorld, provider: String) {
    resolve_now(w, Some(provider)).await;
}

#[then("the resolution succeeds")]
async fn resolution_succeeds(w: &mut MgitWorld) {
    assert!(w.resolve_error.is_none(), "expected success, got {:?}", w.resolve_error);
    assert!(w.resolution.is_some(), "no resolution result");
}

#[then(expr = "the resolution fails with error code {string}")]
async fn resolution_fails(w: &mut MgitWorld, code: String) {
    let err = w.resolve_error.as_ref().expect("expected resolution to fail, but it succeeded");
    assert_eq!(err.code.as_str(), code);
}

#[then(expr = "{int} providers were queried")]
async fn providers_queried(w: &mut MgitWorld, n: usize) {
    let result = w.resolution.as_ref().expect("no resolution result");
    assert_eq!(result.per_provider_counts.len() + result.per_provider_errors.len(), n);
}

#[then(expr = "the resolved repository count is {int}")]
async fn resolved_count(w: &mut MgitWorld, n: usize) {
    let result = w.resolution.as_ref().expect("no resolution result");
    assert_eq!(result.repositories.len(), n);
}

#[then(expr = "the retry count for provider {string} is {int}")]
async fn retry_count(w: &mut MgitWorld, name: String, n: u32) {
    let result = w.resolution.as_ref().expect("no resolution result");
    let diag = result.per_provider_retries.get(&name).expect("no retry diagnostics for that provider");
    assert_eq!(diag.retries, n);
}

// ---------------------------------------------------------------------------
// Bulk engine — Given
// ---------------------------------------------------------------------------

#[given("a bulk workspace")]
async fn bulk_workspace(w: &mut MgitWorld) {
    let workdir = tempdir().unwrap();
    let mut registry = ProviderRegistry::new();
    registry.register("gh_a", MockDriver::new(ProviderKind::GitHub, "gh_a", vec![]));
    w.base_path = Some(workdir.path().to_path_buf());
    w.bulk_options = Some(BulkOptions::new(workdir.path()));
    w.workdir = Some(workdir);
    w.registry = Reg(registry);
}

fn new_upstream(w: &mut MgitWorld) -> PathBuf {
    let upstream = tempdir().unwrap();
    init_repo(upstream.path());
    std::fs::write(upstream.path().join("README.md"), b"hello\n").unwrap();
    commit_all(upstream.path(), "initial");
    let path = upstream.path().to_path_buf();
    w.upstreams.push(upstream);
    path
}

fn push_bulk_repo(w: &mut MgitWorld, name: &str, upstream: Option<&Path>) {
    let mut repo = Repository::new(RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, name));
    if let Some(path) = upstream {
        repo.clone_url_https = Some(path.display().to_string());
    }
    w.bulk_repos.push(repo);
}

#[given(expr = "repository {string} has an upstream and is cloned locally and clean")]
async fn repo_clean(w: &mut MgitWorld, name: String) {
    let upstream = new_upstream(w);
    let base = w.base_path.clone().expect("workspace not set");
    let dest = base.join("acme").join(&name);
    let git = GitExecutor::discover().unwrap();
    git.clone(&upstream.display().to_string(), &dest, None, mgit_git::DEFAULT_CLONE_TIMEOUT).await.unwrap();
    push_bulk_repo(w, &name, Some(&upstream));
}

#[given(expr = "repository {string} has an upstream and is cloned locally and dirty")]
async fn repo_dirty(w: &mut MgitWorld, name: String) {
    let upstream = new_upstream(w);
    let base = w.base_path.clone().expect("workspace not set");
    let dest = base.join("acme").join(&name);
    let git = GitExecutor::discover().unwrap();
    git.clone(&upstream.display().to_string(), &dest, None, mgit_git::DEFAULT_CLONE_TIMEOUT).await.unwrap();
    std::fs::write(dest.join("untracked.txt"), b"uncommitted work\n").unwrap();
    push_bulk_repo(w, &name, Some(&upstream));
}

#[given(expr = "repository {string} has an upstream and is missing locally")]
async fn repo_missing(w: &mut MgitWorld, name: String) {
    let upstream = new_upstream(w);
    push_bulk_repo(w, &name, Some(&upstream));
}

#[given(expr = "{string} is a plain directory that is not a git repository")]
async fn plain_dir(w: &mut MgitWorld, name: String) {
    let base = w.base_path.clone().expect("workspace not set");
    let dest = base.join("acme").join(&name);
    tokio::fs::create_dir_all(&dest).await.unwrap();
    tokio::fs::write(dest.join("readme.txt"), b"not a repo\n").await.unwrap();
    push_bulk_repo(w, &name, None);
}

#[given("force mode is enabled without confirmation")]
async fn force_no_confirmation(w: &mut MgitWorld) {
    let mut options = w.bulk_options.clone().expect("bulk workspace not set up");
    options.force = true;
    w.bulk_options = Some(options);
}

// ---------------------------------------------------------------------------
// Bulk engine — When / Then
// ---------------------------------------------------------------------------

#[when("bulk sync runs")]
async fn bulk_sync_runs(w: &mut MgitWorld) {
    let registry = std::mem::take(&mut w.registry.0);
    let git = Arc::new(GitExecutor::discover().unwrap());
    let engine = BulkOperationEngine::new(Arc::new(registry), git);
    let options = w.bulk_options.clone().expect("bulk workspace not set up");
    match engine.run(&w.bulk_repos, &[], &options).await {
        Ok(report) => w.bulk_report = Some(report),
        Err(e) => w.bulk_error = Some(e),
    }
}

#[then("the bulk run succeeds")]
async fn bulk_succeeds(w: &mut MgitWorld) {
    assert!(w.bulk_error.is_none(), "expected success, got {:?}", w.bulk_error);
    assert!(w.bulk_report.is_some(), "no report produced");
}

#[then(expr = "the bulk run fails with error code {string}")]
async fn bulk_fails(w: &mut MgitWorld, code: String) {
    let err = w.bulk_error.as_ref().expect("expected the run to fail, but it succeeded");
    assert_eq!(err.code.as_str(), code);
}

#[then(expr = "the report counts are cloned={int}, pulled={int}, skipped={int}, failed={int}")]
async fn report_counts(w: &mut MgitWorld, cloned: u32, pulled: u32, skipped: u32, failed: u32) {
    let report = w.bulk_report.as_ref().expect("no report produced");
    assert_eq!(report.counts.cloned, cloned, "cloned count mismatch");
    assert_eq!(report.counts.pulled, pulled, "pulled count mismatch");
    assert_eq!(report.counts.skipped, skipped, "skipped count mismatch");
    assert_eq!(report.counts.failed, failed, "failed count mismatch");
}

#[then(expr = "repository {string} was not cloned")]
async fn repo_not_cloned(w: &mut MgitWorld, name: String) {
    let base = w.base_path.clone().expect("workspace not set");
    let dest = base.join("acme").join(&name);
    assert!(!dest.exists(), "{} should not have been created before the force-confirmation check aborted", dest.display());
}

// ---------------------------------------------------------------------------
// Change pipeline — Given
// ---------------------------------------------------------------------------

fn change_repository() -> Repository {
    Repository::new(RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, "widgets"))
}

#[given("a repository checkout with no prior changeset")]
async fn checkout_with_no_prior_changeset(w: &mut MgitWorld) {
    let repo_dir = tempdir().unwrap();
    init_repo(repo_dir.path());
    w.repo_dir = Some(repo_dir);
    w.store_dir = Some(tempdir().unwrap());
    w.repository = Some(change_repository());
}

fn write_text_file_of_size(w: &MgitWorld, kb: usize, name: &str) {
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");
    let content = "x".repeat(kb * 1024);
    std::fs::write(repo_dir.path().join(name), content).unwrap();
}

#[given(expr = "the checkout has a {int} KB text file {string}")]
async fn checkout_text_file(w: &mut MgitWorld, kb: usize, name: String) {
    write_text_file_of_size(w, kb, &name);
}

#[given(expr = "the checkout has a {int} KB binary file {string}")]
async fn checkout_binary_file(w: &mut MgitWorld, kb: usize, name: String) {
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");
    let bytes = vec![0xFFu8; kb * 1024];
    std::fs::write(repo_dir.path().join(&name), bytes).unwrap();
}

#[given("the files are committed")]
async fn files_committed(w: &mut MgitWorld) {
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");
    commit_all(repo_dir.path(), "change");
}

#[given(expr = "the checkout modifies the file {string}")]
async fn checkout_modifies(w: &mut MgitWorld, name: String) {
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");
    std::fs::write(repo_dir.path().join(&name), "modified content\n").unwrap();
}

#[given(expr = "the checkout adds a {int} KB text file {string}")]
async fn checkout_adds_text_file(w: &mut MgitWorld, kb: usize, name: String) {
    write_text_file_of_size(w, kb, &name);
}

#[given(expr = "the checkout deletes the file {string}")]
async fn checkout_deletes(w: &mut MgitWorld, name: String) {
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");
    std::fs::remove_file(repo_dir.path().join(&name)).unwrap();
}

// ---------------------------------------------------------------------------
// Change pipeline — When / Then
// ---------------------------------------------------------------------------

async fn run_diff(w: &mut MgitWorld) {
    let git = GitExecutor::discover().unwrap();
    let store = ChangesetStore::new(w.store_dir.as_ref().expect("store not set up").path());
    let pipeline = ChangePipeline::new(git, store);
    let repository = w.repository.clone().expect("repository not set up");
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");

    w.diff_outcome = None;
    w.diff_error = None;
    match pipeline.diff(&repository, repo_dir.path(), &DiffOptions::default(), None).await {
        Ok(outcome) => w.diff_outcome = Some(outcome),
        Err(e) => w.diff_error = Some(e),
    }
}

#[given("the change pipeline runs a diff")]
async fn given_diff_runs(w: &mut MgitWorld) {
    run_diff(w).await;
}

#[when("the change pipeline runs a diff")]
async fn when_diff_runs(w: &mut MgitWorld) {
    run_diff(w).await;
}

#[then("the diff succeeds")]
async fn diff_succeeds(w: &mut MgitWorld) {
    assert!(w.diff_error.is_none(), "expected success, got {:?}", w.diff_error);
    assert!(w.diff_outcome.is_some(), "no diff outcome produced");
}

fn find_file_op<'a>(outcome: &'a DiffOutcome, path: &str) -> &'a mgit_core::FileOpRecord {
    outcome
        .records
        .iter()
        .find_map(|r| match r {
            ChangeRecord::FileOp(f) if f.path == path => Some(f),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no file-op record for '{path}'"))
}

#[then(expr = "the diff emits an add record for {string} with inline content")]
async fn add_with_inline_content(w: &mut MgitWorld, path: String) {
    let outcome = w.diff_outcome.as_ref().expect("no diff outcome");
    let record = find_file_op(outcome, &path);
    assert_eq!(record.op, ChangeOp::Add);
    assert!(record.content.is_some(), "expected inline text content for '{path}'");
    assert!(record.content_base64.is_none());
    assert!(record.content_ref.is_none());
}

#[then(expr = "the diff emits an add record for {string} with a content reference and skip_index")]
async fn add_with_content_ref(w: &mut MgitWorld, path: String) {
    let outcome = w.diff_outcome.as_ref().expect("no diff outcome");
    let record = find_file_op(outcome, &path);
    assert_eq!(record.op, ChangeOp::Add);
    assert!(record.content_ref.is_some(), "expected a content_ref for '{path}'");
    assert_eq!(record.skip_index, Some(true));
}

#[then(expr = "the diff emits an add record for {string} with base64 content")]
async fn add_with_base64_content(w: &mut MgitWorld, path: String) {
    let outcome = w.diff_outcome.as_ref().expect("no diff outcome");
    let record = find_file_op(outcome, &path);
    assert_eq!(record.op, ChangeOp::Add);
    assert!(record.content_base64.is_some(), "expected base64 content for '{path}'");
}

#[then("the diff ends with a completion marker")]
async fn diff_ends_with_completion(w: &mut MgitWorld) {
    let outcome = w.diff_outcome.as_ref().expect("no diff outcome");
    assert!(outcome.records.last().is_some_and(ChangeRecord::is_completion), "last record should be the completion marker");
}

#[then("the changeset store anchor commit now equals HEAD")]
async fn anchor_equals_head(w: &mut MgitWorld) {
    let repo_dir = w.repo_dir.as_ref().expect("checkout not set up");
    let head = rev_parse_head(repo_dir.path());
    let repository = w.repository.clone().expect("repository not set up");
    let store = ChangesetStore::new(w.store_dir.as_ref().expect("store not set up").path());
    let changeset = store.get(&repository.identity).await.unwrap().expect("no changeset persisted");
    assert_eq!(changeset.commit, head);
}

#[then(expr = "the diff records are, in order: {string}")]
async fn records_in_order(w: &mut MgitWorld, expected_csv: String) {
    let outcome = w.diff_outcome.as_ref().expect("no diff outcome");
    let actual: Vec<(String, String)> = outcome
        .records
        .iter()
        .filter_map(|r| match r {
            ChangeRecord::FileOp(f) => {
                let op = match f.op {
                    ChangeOp::Add => "add",
                    ChangeOp::Modify => "modify",
                    ChangeOp::Delete => "delete",
                };
                Some((op.to_string(), f.path.clone()))
            }
            ChangeRecord::Completion(_) => None,
        })
        .collect();

    let expected: Vec<(String, String)> = expected_csv
        .split(',')
        .map(|entry| {
            let mut parts = entry.trim().splitn(2, ' ');
            let op = parts.next().unwrap().to_string();
            let path = parts.next().unwrap().to_string();
            (op, path)
        })
        .collect();

    assert_eq!(actual, expected, "file-op records should appear in the expected order");
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    MgitWorld::run("tests/features").await;
}
