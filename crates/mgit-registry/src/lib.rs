#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-registry
//!
//! The Provider Registry (spec.md C3 / §4.3): a typed map from configured
//! name to driver instance, ported directly from the teacher's
//! `abp-runtime::registry::BackendRegistry`, substituting `Driver` for
//! `Backend`. Construction is eager at process startup; thereafter the
//! registry is read-only (spec.md §5 "Shared-resource policy").

use mgit_error::{ErrorCode, MgitError};
use mgit_provider::Driver;
use std::collections::HashMap;
use std::sync::Arc;

/// A named registry of [`Driver`] instances.
#[derive(Default)]
pub struct ProviderRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
    default_name: Option<String>,
}

impl ProviderRegistry {
    /// An empty registry with no configured default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, driver: impl Driver + 'static) {
        self.drivers.insert(name.into(), Arc::new(driver));
    }

    /// Register an already-shared driver under `name`.
    pub fn register_arc(&mut self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.into(), driver);
    }

    /// Set which registered name `resolve_default` should return.
    pub fn set_default(&mut self, name: impl Into<String>) {
        self.default_name = Some(name.into());
    }

    /// Look up a driver by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Driver> {
        self.drivers.get(name).map(|d| &**d)
    }

    /// Return an `Arc` handle to the named driver, the shape C4/C6 use to
    /// hold a driver across an `await` point without borrowing the
    /// registry.
    #[must_use]
    pub fn get_arc(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    /// A sorted list of registered configuration names, used by C4 to
    /// iterate "every registered driver" in a stable order (spec.md §4.4
    /// step 1, §8 invariant "stable for a given registry order").
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether a driver is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Resolve the configured default name, or `ConfigUnknownProvider` if
    /// none was set.
    pub fn resolve_default(&self) -> Result<&str, MgitError> {
        self.default_name.as_deref().ok_or_else(|| {
            MgitError::new(ErrorCode::ConfigUnknownProvider, "no default provider configuration is set")
        })
    }

    /// Number of registered drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Whether the registry has no registered drivers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}
