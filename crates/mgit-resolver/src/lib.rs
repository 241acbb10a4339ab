#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-resolver
//!
//! The Multi-Provider Resolver (spec.md C4 / §4.4): fan out pattern
//! resolution across selected provider drivers concurrently, tolerating
//! partial failure, then deduplicate and cap the merged result. Fan-out
//! uses `futures::stream::FuturesUnordered`, the same adaptive-concurrency
//! shape the pack's repo-sync reference code uses for concurrent per-item
//! I/O, generalized here from per-repo sync to per-driver listing.

use futures::stream::{FuturesUnordered, StreamExt};
use mgit_core::Repository;
use mgit_error::{ErrorCode, MgitError};
use mgit_pattern::PatternSpec;
use mgit_provider::Driver;
use mgit_registry::ProviderRegistry;
use mgit_retry::{retry_with_diagnostics, RetryDiagnostics, RetryPolicy};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The merged outcome of one `resolve()` call (spec.md §4.4 "Result
/// contract").
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    /// The deduplicated, possibly limit-capped repository set. Ordering is
    /// stable for a given registry order and driver response ordering.
    pub repositories: Vec<Repository>,
    /// Repositories returned by each successful provider, before dedup.
    pub per_provider_counts: BTreeMap<String, usize>,
    /// Errors from providers that failed, keyed by configuration name.
    pub per_provider_errors: BTreeMap<String, MgitError>,
    /// Retry diagnostics for each provider's `list_repositories` call
    /// (spec.md §8 scenario S6).
    pub per_provider_retries: BTreeMap<String, RetryDiagnostics>,
    /// Wall-clock duration of the whole resolution.
    pub elapsed_ms: u64,
}

/// Resolve `pattern` against the drivers in `registry`.
///
/// - If `explicit_provider` is set, only that named driver is queried.
/// - Else if `explicit_url` is set, the registry's configured default
///   driver is queried (an explicit clone URL identifies a single
///   repository, not a provider name by itself; resolving it to one driver
///   requires the registry default — see DESIGN.md's Open Question
///   resolution for this case).
/// - Otherwise every registered driver is queried (spec.md §4.4 step 1,
///   §8 invariants 2-3).
///
/// `limit` is applied **after** merging and deduplicating across
/// providers, never passed down to an individual driver's own `limit`
/// parameter, so that overlapping results from two configurations are not
/// prematurely truncated before dedup can run (spec.md §4.4 step 5).
pub async fn resolve(
    registry: &ProviderRegistry,
    pattern: &PatternSpec,
    explicit_provider: Option<&str>,
    explicit_url: Option<&str>,
    limit: Option<usize>,
) -> Result<ResolutionResult, MgitError> {
    let start = Instant::now();

    if limit == Some(0) {
        return Ok(ResolutionResult {
            repositories: Vec::new(),
            per_provider_counts: BTreeMap::new(),
            per_provider_errors: BTreeMap::new(),
            per_provider_retries: BTreeMap::new(),
            elapsed_ms: elapsed_ms(start),
        });
    }

    let selected = select_providers(registry, explicit_provider, explicit_url)?;
    tracing::debug!(providers = ?selected, pattern = %pattern, "resolving pattern across providers");

    let mut in_flight = FuturesUnordered::new();
    for name in &selected {
        let driver = registry
            .get_arc(name)
            .expect("selected provider name was just validated against the registry");
        let name = name.clone();
        let pattern = pattern.clone();
        in_flight.push(async move {
            let (result, diagnostics) = list_with_retry(driver, &pattern).await;
            (name, result, diagnostics)
        });
    }

    let mut per_provider_results: BTreeMap<String, Result<Vec<Repository>, MgitError>> = BTreeMap::new();
    let mut per_provider_retries = BTreeMap::new();
    while let Some((name, result, diagnostics)) = in_flight.next().await {
        per_provider_retries.insert(name.clone(), diagnostics);
        per_provider_results.insert(name, result);
    }

    let mut repositories = Vec::new();
    let mut seen_keys = HashSet::new();
    let mut per_provider_counts = BTreeMap::new();
    let mut per_provider_errors = BTreeMap::new();
    let mut success_count = 0;

    // Iterate in `selected` (registry) order so duplicates resolve in
    // favor of the first configuration that reported them, per spec.md
    // §4.4 step 4.
    for name in &selected {
        match per_provider_results.remove(name).expect("every selected provider produced exactly one outcome") {
            Ok(repos) => {
                success_count += 1;
                per_provider_counts.insert(name.clone(), repos.len());
                for repo in repos {
                    let key = repo.identity_key();
                    if seen_keys.insert(key) {
                        repositories.push(repo);
                    } else {
                        tracing::info!(provider = %name, repo = %repo.identity, "duplicate repository across provider configurations, keeping first");
                    }
                }
            }
            Err(err) => {
                per_provider_errors.insert(name.clone(), err);
            }
        }
    }

    if success_count == 0 {
        return Err(MgitError::new(
            ErrorCode::ConfigNoProviders,
            "every selected provider failed to resolve",
        )
        .with_context("providers", selected.join(",")));
    }

    if let Some(limit) = limit {
        repositories.truncate(limit);
    }

    Ok(ResolutionResult {
        repositories,
        per_provider_counts,
        per_provider_errors,
        per_provider_retries,
        elapsed_ms: elapsed_ms(start),
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    Duration::as_millis(&start.elapsed()) as u64
}

fn select_providers(
    registry: &ProviderRegistry,
    explicit_provider: Option<&str>,
    explicit_url: Option<&str>,
) -> Result<Vec<String>, MgitError> {
    if explicit_provider.is_some() || explicit_url.is_some() {
        let name = match explicit_provider {
            Some(name) => name.to_string(),
            None => registry.resolve_default()?.to_string(),
        };
        if !registry.contains(&name) {
            return Err(MgitError::new(ErrorCode::ConfigUnknownProvider, format!("no provider configuration named '{name}'"))
                .with_context("provider", name));
        }
        return Ok(vec![name]);
    }

    let names = registry.list_names();
    if names.is_empty() {
        return Err(MgitError::new(ErrorCode::ConfigNoProviders, "no providers are registered"));
    }
    Ok(names.into_iter().map(String::from).collect())
}

async fn list_with_retry(driver: Arc<dyn Driver>, pattern: &PatternSpec) -> (Result<Vec<Repository>, MgitError>, RetryDiagnostics) {
    retry_with_diagnostics(
        RetryPolicy::new(),
        |err: &MgitError| err.code.is_retryable(),
        || {
            let driver = Arc::clone(&driver);
            let pattern = pattern.clone();
            async move { driver.list_repositories(&pattern, None).await }
        },
    )
    .await
}
