// SPDX-License-Identifier: MIT OR Apache-2.0
//! Provider kinds and the stable repository identity key (spec.md §3).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

/// The kind of hosting provider a [`RepositoryIdentity`]/config refers to.
///
/// `Custom` covers pluggable additions beyond the three built-in drivers
/// (spec.md §1 "Azure DevOps, GitHub, Bitbucket, and pluggable additions").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Azure DevOps (3-level org/project/repo hierarchy).
    AzureDevOps,
    /// GitHub (2-level org/repo hierarchy).
    GitHub,
    /// Bitbucket (2-level workspace/repo hierarchy).
    Bitbucket,
    /// A pluggable provider kind identified by a lowercase name.
    Custom(String),
}

impl ProviderKind {
    /// Canonical lowercase string form, as used in `ProviderConfig::kind`.
    #[must_use]
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Self::AzureDevOps => Cow::Borrowed("azuredevops"),
            Self::GitHub => Cow::Borrowed("github"),
            Self::Bitbucket => Cow::Borrowed("bitbucket"),
            Self::Custom(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Parse a kind from its canonical lowercase string form.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "azuredevops" => Self::AzureDevOps,
            "github" => Self::GitHub,
            "bitbucket" => Self::Bitbucket,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl Serialize for ProviderKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Err(D::Error::custom("provider kind must not be empty"));
        }
        Ok(Self::from_str_lossy(&s))
    }
}

/// The 5-tuple uniquely naming a repository: `(kind, config_name,
/// organization, project?, name)`. `project` is present only for providers
/// with a 3-level hierarchy. Stable under repeated listing within a single
/// resolution (spec.md §3 invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    /// Which provider kind this repository was discovered through.
    pub provider_kind: ProviderKind,
    /// The named `ProviderConfig` this repository was discovered through.
    pub provider_config_name: String,
    /// Organization (or workspace) name.
    pub organization: String,
    /// Project name, present only for 3-level providers.
    pub project: Option<String>,
    /// Repository name.
    pub name: String,
}

impl RepositoryIdentity {
    /// Create a new identity.
    pub fn new(
        provider_kind: ProviderKind,
        provider_config_name: impl Into<String>,
        organization: impl Into<String>,
        project: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            provider_kind,
            provider_config_name: provider_config_name.into(),
            organization: organization.into(),
            project,
            name: name.into(),
        }
    }

    /// A stable, filesystem-safe hex hash of the identity tuple.
    ///
    /// Used by the Changeset Store (spec.md §6) to name per-repository
    /// persistence files, and may be used generically as a compact
    /// identity key in change-stream records.
    #[must_use]
    pub fn stable_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.provider_kind.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.provider_config_name.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.organization.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.project.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.name.as_bytes());
        let digest = hasher.finalize();
        hex_encode(&digest)
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(
                f,
                "{}:{}/{}/{}/{}",
                self.provider_kind, self.provider_config_name, self.organization, project, self.name
            ),
            None => write!(
                f,
                "{}:{}/{}/{}",
                self.provider_kind, self.provider_config_name, self.organization, self.name
            ),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips_canonical_names() {
        for kind in [ProviderKind::AzureDevOps, ProviderKind::GitHub, ProviderKind::Bitbucket] {
            let s = kind.as_str().into_owned();
            assert_eq!(ProviderKind::from_str_lossy(&s), kind);
        }
    }

    #[test]
    fn unknown_kind_becomes_custom() {
        assert_eq!(
            ProviderKind::from_str_lossy("gitea"),
            ProviderKind::Custom("gitea".to_string())
        );
    }

    #[test]
    fn stable_hash_is_deterministic_and_distinguishes_identities() {
        let a = RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, "widgets");
        let b = RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, "widgets");
        let c = RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, "gadgets");
        assert_eq!(a.stable_hash(), b.stable_hash());
        assert_ne!(a.stable_hash(), c.stable_hash());
        assert_eq!(a.stable_hash().len(), 64);
    }

    #[test]
    fn project_distinguishes_otherwise_identical_identities() {
        let two_level = RepositoryIdentity::new(ProviderKind::GitHub, "gh_a", "acme", None, "widgets");
        let three_level = RepositoryIdentity::new(
            ProviderKind::AzureDevOps,
            "gh_a",
            "acme",
            Some("platform".to_string()),
            "widgets",
        );
        assert_ne!(two_level.stable_hash(), three_level.stable_hash());
    }

    #[test]
    fn serde_round_trip() {
        let id = RepositoryIdentity::new(
            ProviderKind::Custom("gitea".to_string()),
            "gitea_main",
            "acme",
            None,
            "widgets",
        );
        let json = serde_json::to_string(&id).unwrap();
        let back: RepositoryIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
