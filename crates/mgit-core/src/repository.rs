// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Repository`] value record (spec.md §3).

use crate::identity::{ProviderKind, RepositoryIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository as discovered by a provider driver.
///
/// Uniquely identified by [`Repository::identity`]; all other fields are
/// nullable attributes that may vary between listings (e.g. `last_activity`
/// advances over time) without affecting identity equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// The stable 5-tuple identity.
    pub identity: RepositoryIdentity,
    /// HTTPS clone URL, if the driver could produce one.
    pub clone_url_https: Option<String>,
    /// Default branch name, if known.
    pub default_branch: Option<String>,
    /// Whether the provider reports this repository as disabled/archived.
    pub disabled: bool,
    /// Provider-reported visibility (`"private"`, `"public"`, ...).
    pub visibility: Option<String>,
    /// A rough size hint in kibibytes, if the provider exposes one.
    pub size_hint: Option<u64>,
    /// Last-activity timestamp, if the provider exposes one.
    pub last_activity: Option<DateTime<Utc>>,
}

impl Repository {
    /// Construct a repository record from its identity, leaving all
    /// optional attributes unset.
    #[must_use]
    pub fn new(identity: RepositoryIdentity) -> Self {
        Self {
            identity,
            clone_url_https: None,
            default_branch: None,
            disabled: false,
            visibility: None,
            size_hint: None,
            last_activity: None,
        }
    }

    /// Shorthand for `self.identity.organization`.
    #[must_use]
    pub fn organization(&self) -> &str {
        &self.identity.organization
    }

    /// Shorthand for `self.identity.project`.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.identity.project.as_deref()
    }

    /// Shorthand for `self.identity.name`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Shorthand for `self.identity.provider_kind`.
    #[must_use]
    pub fn provider_kind(&self) -> &ProviderKind {
        &self.identity.provider_kind
    }

    /// Shorthand for `self.identity.provider_config_name`.
    #[must_use]
    pub fn provider_config_name(&self) -> &str {
        &self.identity.provider_config_name
    }

    /// Shorthand for `self.identity.stable_hash()`.
    #[must_use]
    pub fn identity_key(&self) -> String {
        self.identity.stable_hash()
    }

    /// The filesystem path this repository should live at under a bulk
    /// operation's `base_path`, per spec.md §4.6's path construction rule:
    /// `base/org/project/repo` for 3-level providers, `base/org/repo`
    /// otherwise. Path segments are not sanitized here; callers performing
    /// filesystem writes must still apply `sanitize_path_segment`.
    #[must_use]
    pub fn relative_path(&self) -> std::path::PathBuf {
        let mut path = std::path::PathBuf::new();
        path.push(&self.identity.organization);
        if let Some(project) = &self.identity.project {
            path.push(project);
        }
        path.push(&self.identity.name);
        path
    }
}

/// Reject path segments that could escape a base directory (`..`, absolute
/// components, or embedded separators) before they are joined onto a
/// filesystem path, per spec.md §4.6 "Names are sanitized to reject `..`
/// and absolute segments."
#[must_use]
pub fn sanitize_path_segment(segment: &str) -> bool {
    if segment.is_empty() || segment == "." || segment == ".." {
        return false;
    }
    !segment.contains('/') && !segment.contains('\\') && !segment.starts_with(std::path::MAIN_SEPARATOR)
}
