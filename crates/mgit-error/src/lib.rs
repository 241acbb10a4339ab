//! Unified error taxonomy with stable error codes for mgit.
//!
//! Every mgit error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`MgitError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to, per the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No providers configured, or an unknown provider name was referenced.
    Config,
    /// Authentication against a provider failed.
    Auth,
    /// Transport-level failure talking to a provider or git remote.
    Network,
    /// A provider signalled that its rate limit was exceeded.
    RateLimit,
    /// A provider's response did not match the shape its driver expects.
    ProviderSchema,
    /// The three-segment glob pattern failed to parse or validate.
    Pattern,
    /// The git executor reported a failure running the `git` binary.
    Git,
    /// The changeset store failed to read, write, or iterate.
    Storage,
    /// A change record failed validation.
    Validation,
    /// The operation was cancelled before completion.
    Cancelled,
    /// An operation exceeded its allotted timeout.
    Timeout,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Network => "network",
            Self::RateLimit => "rate_limit",
            Self::ProviderSchema => "provider_schema",
            Self::Pattern => "pattern",
            Self::Git => "git",
            Self::Storage => "storage",
            Self::Validation => "validation",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Config --
    /// No providers are registered at all.
    ConfigNoProviders,
    /// The named provider configuration does not exist in the registry.
    ConfigUnknownProvider,
    /// `force=true` was requested without an accompanying confirmation.
    ConfigForceConfirmationRequired,

    // -- Auth --
    /// Credential material was rejected by the provider.
    AuthFailed,

    // -- Network --
    /// A transport-level failure occurred talking to a provider.
    NetworkError,

    // -- RateLimit --
    /// The provider reported that its rate limit was exceeded.
    RateLimited,

    // -- ProviderSchema --
    /// The provider's response body did not match the expected shape.
    ProviderSchemaError,
    /// The driver does not support the requested capability (e.g. a
    /// clone URL auth scheme an org has disabled).
    ProviderUnsupported,

    // -- Pattern --
    /// The pattern did not contain exactly three segments.
    PatternReasonSegmentCount,
    /// A segment did not compile as a valid glob.
    PatternReasonInvalidGlob,
    /// The pattern contained an empty interior segment.
    PatternReasonEmptySegment,

    // -- Git --
    /// The target directory is not a git repository.
    GitNotARepo,
    /// The working tree has uncommitted modifications.
    GitDirtyWorkingTree,
    /// A merge conflict was detected.
    GitMergeConflict,
    /// Authentication to the git remote failed.
    GitNetworkAuth,
    /// The configured remote no longer exists.
    GitRemoteGone,
    /// An unrecognized git failure; raw stderr is carried in context.
    GitUnknown,

    // -- Storage --
    /// The changeset store failed to read or write a record.
    StorageError,

    // -- Validation --
    /// A change record failed validation.
    ValidationFailed,

    // -- Cancelled --
    /// The operation was cancelled before it completed.
    Cancelled,

    // -- Timeout --
    /// An operation exceeded its allotted timeout.
    TimedOut,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigNoProviders
            | Self::ConfigUnknownProvider
            | Self::ConfigForceConfirmationRequired => ErrorCategory::Config,

            Self::AuthFailed => ErrorCategory::Auth,

            Self::NetworkError => ErrorCategory::Network,

            Self::RateLimited => ErrorCategory::RateLimit,

            Self::ProviderSchemaError | Self::ProviderUnsupported => ErrorCategory::ProviderSchema,

            Self::PatternReasonSegmentCount
            | Self::PatternReasonInvalidGlob
            | Self::PatternReasonEmptySegment => ErrorCategory::Pattern,

            Self::GitNotARepo
            | Self::GitDirtyWorkingTree
            | Self::GitMergeConflict
            | Self::GitNetworkAuth
            | Self::GitRemoteGone
            | Self::GitUnknown => ErrorCategory::Git,

            Self::StorageError => ErrorCategory::Storage,

            Self::ValidationFailed => ErrorCategory::Validation,

            Self::Cancelled => ErrorCategory::Cancelled,

            Self::TimedOut => ErrorCategory::Timeout,
        }
    }

    /// Whether the core itself may retry an operation that failed with this
    /// code (exponential backoff, base 1s, factor 2, jitter, cap 3 attempts).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::NetworkError)
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"RATE_LIMITED"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigNoProviders => "CONFIG_NO_PROVIDERS",
            Self::ConfigUnknownProvider => "CONFIG_UNKNOWN_PROVIDER",
            Self::ConfigForceConfirmationRequired => "CONFIG_FORCE_CONFIRMATION_REQUIRED",
            Self::AuthFailed => "AUTH_FAILED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::ProviderSchemaError => "PROVIDER_SCHEMA_ERROR",
            Self::ProviderUnsupported => "PROVIDER_UNSUPPORTED",
            Self::PatternReasonSegmentCount => "PATTERN_REASON_SEGMENT_COUNT",
            Self::PatternReasonInvalidGlob => "PATTERN_REASON_INVALID_GLOB",
            Self::PatternReasonEmptySegment => "PATTERN_REASON_EMPTY_SEGMENT",
            Self::GitNotARepo => "GIT_NOT_A_REPO",
            Self::GitDirtyWorkingTree => "GIT_DIRTY_WORKING_TREE",
            Self::GitMergeConflict => "GIT_MERGE_CONFLICT",
            Self::GitNetworkAuth => "GIT_NETWORK_AUTH",
            Self::GitRemoteGone => "GIT_REMOTE_GONE",
            Self::GitUnknown => "GIT_UNKNOWN",
            Self::StorageError => "STORAGE_ERROR",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MgitError
// ---------------------------------------------------------------------------

/// Unified mgit error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
/// Context keys named `credential`, `token`, or `secret` are stripped by
/// [`MgitError::redact_context`] before the error crosses any event or log
/// boundary, per §3's "only a fingerprint hash may appear" rule.
///
/// # Builder usage
///
/// ```
/// use mgit_error::{MgitError, ErrorCode};
///
/// let err = MgitError::new(ErrorCode::RateLimited, "secondary rate limit hit")
///     .with_context("provider", "github")
///     .with_context("retry_after_ms", 2000);
/// ```
pub struct MgitError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description. Never contains credential material.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

const REDACTED_CONTEXT_KEYS: &[&str] = &["credential", "token", "secret", "password"];

impl MgitError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails, the entry is silently skipped. Keys that look like credential
    /// material are dropped immediately rather than stored and redacted
    /// later.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        if REDACTED_CONTEXT_KEYS
            .iter()
            .any(|k| key.eq_ignore_ascii_case(k))
        {
            return self;
        }
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key, v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Strip any context entries whose key matches a known credential-like
    /// name. Defensive: [`Self::with_context`] already refuses to store
    /// them, but this guards values that arrived through other paths (e.g.
    /// deserialized from a DTO written by an older version).
    pub fn redact_context(&mut self) {
        self.context
            .retain(|k, _| !REDACTED_CONTEXT_KEYS.iter().any(|r| k.eq_ignore_ascii_case(r)));
    }
}

impl fmt::Debug for MgitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("MgitError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for MgitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for MgitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serializable snapshot of an [`MgitError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MgitErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&MgitError> for MgitErrorDto {
    fn from(err: &MgitError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<MgitErrorDto> for MgitError {
    fn from(dto: MgitErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}
