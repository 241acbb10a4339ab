// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`ProviderConfig`] and opaque [`Credential`] material (spec.md §3, §6).

use crate::identity::ProviderKind;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque credential material for a [`ProviderConfig`].
///
/// Never logged, displayed, or included in any event: [`Credential::Debug`]
/// prints a fixed redaction marker, and the only derived value that ever
/// leaves this type is [`Credential::fingerprint`] — a truncated,
/// non-reversible digest (spec.md §3 "only a fingerprint hash may" appear
/// in events).
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Vec<u8>);

impl Credential {
    /// Wrap opaque credential bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Borrow the raw bytes. Callers (drivers only) use this to authenticate
    /// against a provider; it must never be forwarded into a log or event.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// A 12-byte (24 hex character) SHA-256 fingerprint, safe to log or
    /// place in a [`ProgressEvent`](crate::ProgressEvent) to correlate "same
    /// credential used across two named configs" without exposing it.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        let mut s = String::with_capacity(24);
        for b in &digest[..12] {
            use std::fmt::Write as _;
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(REDACTED fingerprint={})", self.fingerprint())
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(D::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// A named provider configuration, as supplied by the host (spec.md §6
/// "External Interfaces"). Config *loading* — files, env vars, credential
/// persistence — is explicitly out of scope (§1 Non-goals); the core only
/// ever consumes an already-resolved map of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which driver this configuration selects.
    pub kind: ProviderKind,
    /// Base API URL, for providers/deployments where it varies (e.g.
    /// self-hosted Azure DevOps Server, Bitbucket Server).
    pub base_url: Option<String>,
    /// Opaque credential material handed to the driver's `authenticate()`.
    pub credential: Credential,
    /// Per-config override of the driver's default concurrency cap
    /// (spec.md §4.2); `None` uses the driver's built-in default.
    pub rate_limit_override: Option<u32>,
    /// Default organization/workspace to assume when a pattern's org
    /// segment is otherwise ambiguous for this config. Driver-specific;
    /// the core does not interpret it itself.
    pub default_organization: Option<String>,
}

impl ProviderConfig {
    /// Construct a configuration with only the required fields set.
    #[must_use]
    pub fn new(kind: ProviderKind, credential: Credential) -> Self {
        Self {
            kind,
            base_url: None,
            credential,
            rate_limit_override: None,
            default_organization: None,
        }
    }
}
