#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-provider
//!
//! The Provider Abstraction Layer (spec.md C2 / §4.2): a uniform
//! `Driver` capability set implemented once per hosting provider. Modeled
//! on the teacher's `abp-backend-core::Backend` trait — the same shape
//! (`async_trait`, stateless-across-calls, registry-held behind `Arc<dyn
//! Driver>`), generalized from "run a work order" to "authenticate /
//! list / synthesize a clone URL" since providers here are repository
//! hosts, not agent backends.

mod azuredevops;
mod bitbucket;
mod github;
mod http;
mod mock;

pub use azuredevops::AzureDevOpsDriver;
pub use bitbucket::BitbucketDriver;
pub use github::GitHubDriver;
pub use mock::MockDriver;

use async_trait::async_trait;
use mgit_core::{ProviderKind, Repository};
use mgit_error::MgitError;
use mgit_pattern::PatternSpec;

/// How a clone URL should carry credential material, per spec.md §4.2's
/// `clone_url` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Token spliced into the HTTPS URL's userinfo component.
    Embed,
    /// An `ssh://` or `git@host:org/repo` URL; credential material is an
    /// SSH key handled outside the URL itself.
    Ssh,
    /// HTTPS URL with no embedded credential; the caller supplies an
    /// `Authorization` header (or git askpash helper) out of band.
    Basic,
}

/// The built-in per-provider concurrency cap (spec.md §4.2), enforced by
/// each driver internally regardless of caller concurrency.
#[must_use]
pub fn default_concurrency_cap(kind: &ProviderKind) -> usize {
    match kind {
        ProviderKind::GitHub => 10,
        ProviderKind::AzureDevOps => 4,
        ProviderKind::Bitbucket => 5,
        ProviderKind::Custom(_) => 4,
    }
}

/// A provider-specific implementation of the capability set in spec.md
/// §4.2: authenticate, list matching repositories, synthesize a clone URL.
///
/// Drivers are stateless across calls (any HTTP client/connection reuse is
/// internal); a registry (`mgit-registry`) holds named instances behind
/// `Arc<dyn Driver>` for the lifetime of the process.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Which provider kind this driver implements.
    fn kind(&self) -> ProviderKind;

    /// The named configuration this driver instance was built from, used
    /// to populate `RepositoryIdentity::provider_config_name`.
    fn config_name(&self) -> &str;

    /// Verify the configured credential and return a non-reversible
    /// fingerprint for correlation in logs/events (spec.md §2 supplement:
    /// "driver auth-fingerprinting").
    async fn authenticate(&self) -> Result<String, MgitError>;

    /// List repositories visible to this driver's credential that could
    /// possibly satisfy `pattern`, applying server-side filters where the
    /// provider's API supports them and `PatternSpec::matches` client-side
    /// otherwise. Ordering is driver-internal but must be stable across
    /// repeated calls within one resolution (spec.md §3 invariant).
    async fn list_repositories(
        &self,
        pattern: &PatternSpec,
        limit: Option<usize>,
    ) -> Result<Vec<Repository>, MgitError>;

    /// Synthesize a clone URL for `repository` under the requested
    /// `scheme`. Returns `Err` with `ErrorCode::ProviderUnsupported` when
    /// this driver/org disables the requested scheme.
    fn clone_url(&self, repository: &Repository, scheme: AuthScheme) -> Result<String, MgitError>;
}
