// SPDX-License-Identifier: MIT OR Apache-2.0
//! A deterministic in-memory [`Driver`] for tests, ported from the
//! teacher's `abp-backend-mock::MockBackend` shape: no network calls, a
//! fixed fingerprint, and a caller-supplied fixture list filtered the same
//! way a real driver would filter server-side-unsupported positions.

use crate::{AuthScheme, Driver};
use async_trait::async_trait;
use mgit_core::{ProviderKind, Repository};
use mgit_error::{ErrorCode, MgitError};
use mgit_pattern::PatternSpec;
use std::sync::Mutex;

/// A fixture-backed driver for deterministic resolver/bulk-engine tests.
pub struct MockDriver {
    kind: ProviderKind,
    config_name: String,
    fixtures: Vec<Repository>,
    fingerprint: String,
    /// When the remaining count is nonzero, `authenticate()`/
    /// `list_repositories()` return the configured `(code, message)` as an
    /// error instead of succeeding, decrementing the count each time, to
    /// exercise partial-failure and retry-recovery paths (spec.md §4.4 step
    /// 3, §8 scenario S6).
    fail_with: Mutex<Option<(ErrorCode, String, u32)>>,
}

impl MockDriver {
    /// Build a mock driver over a fixed repository fixture list.
    #[must_use]
    pub fn new(kind: ProviderKind, config_name: impl Into<String>, fixtures: Vec<Repository>) -> Self {
        Self {
            kind,
            config_name: config_name.into(),
            fixtures,
            fingerprint: "mock-fingerprint".to_string(),
            fail_with: Mutex::new(None),
        }
    }

    /// Make the very next call fail with `err`, then succeed afterwards.
    pub fn fail_next_calls_with(&self, err: MgitError) {
        self.fail_next_n_calls_with(1, err);
    }

    /// Make the next `n` calls fail with `err`, then succeed. Used to
    /// simulate a flaky provider recovering after repeated rate-limiting
    /// (spec.md §8 scenario S6).
    pub fn fail_next_n_calls_with(&self, n: u32, err: MgitError) {
        *self.fail_with.lock().expect("mock driver mutex is never poisoned") = Some((err.code, err.message, n));
    }

    fn take_failure(&self) -> Option<MgitError> {
        let mut guard = self.fail_with.lock().expect("mock driver mutex is never poisoned");
        match guard.take() {
            Some((code, message, remaining)) if remaining > 1 => {
                *guard = Some((code, message.clone(), remaining - 1));
                Some(MgitError::new(code, message))
            }
            Some((code, message, _)) => Some(MgitError::new(code, message)),
            None => None,
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn kind(&self) -> ProviderKind {
        self.kind.clone()
    }

    fn config_name(&self) -> &str {
        &self.config_name
    }

    async fn authenticate(&self) -> Result<String, MgitError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.fingerprint.clone())
    }

    async fn list_repositories(&self, pattern: &PatternSpec, limit: Option<usize>) -> Result<Vec<Repository>, MgitError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for repo in &self.fixtures {
            if pattern.matches(repo.organization(), repo.project(), repo.name())? {
                out.push(repo.clone());
                if let Some(limit) = limit {
                    if out.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    fn clone_url(&self, repository: &Repository, _scheme: AuthScheme) -> Result<String, MgitError> {
        Ok(repository
            .clone_url_https
            .clone()
            .unwrap_or_else(|| format!("mock://{}", repository.identity_key())))
    }
}
