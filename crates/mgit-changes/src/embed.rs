// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tiered content embedding (spec.md §4.8 step 5): small files travel as
//! UTF-8 text or base64 inline, mid-size files always as base64, and large
//! files as a stable out-of-band reference rather than inline bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Default small-tier ceiling: 10 KiB.
pub const DEFAULT_SMALL_MAX: u64 = 10 * 1024;
/// Default mid-tier ceiling: 100 KiB.
pub const DEFAULT_MID_MAX: u64 = 100 * 1024;

/// Size thresholds governing which tier a file's content falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedPolicy {
    /// Files at or below this size may be embedded as UTF-8 text.
    pub small_max: u64,
    /// Files at or below this size (but above `small_max`) are always
    /// base64-encoded inline.
    pub mid_max: u64,
}

impl Default for EmbedPolicy {
    fn default() -> Self {
        Self {
            small_max: DEFAULT_SMALL_MAX,
            mid_max: DEFAULT_MID_MAX,
        }
    }
}

/// The tiered outcome of embedding one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbeddedContent {
    /// Small, UTF-8-decodable text, embedded verbatim.
    Text(String),
    /// Small non-UTF-8 content, or any mid-tier content, base64-encoded.
    Base64(String),
    /// Oversize content, represented by a stable out-of-band reference.
    Ref(String),
}

/// Build the `content_ref` string for a file that is not embedded inline
/// (spec.md §4.8 step 5: "commit-sha + blob-sha + path").
#[must_use]
pub fn stable_content_ref(commit: &str, blob: &str, path: &str) -> String {
    format!("{commit}:{blob}:{path}")
}

/// Decide the embedding tier for `bytes` under `policy`, synthesizing a
/// `content_ref` via `commit`/`blob`/`path` only when the oversize tier is
/// reached (the other tiers never need it).
#[must_use]
pub fn embed(bytes: &[u8], commit: &str, blob: &str, path: &str, policy: &EmbedPolicy) -> EmbeddedContent {
    let size = bytes.len() as u64;
    if size <= policy.small_max {
        match std::str::from_utf8(bytes) {
            Ok(text) => EmbeddedContent::Text(text.to_string()),
            Err(_) => EmbeddedContent::Base64(BASE64.encode(bytes)),
        }
    } else if size <= policy.mid_max {
        EmbeddedContent::Base64(BASE64.encode(bytes))
    } else {
        EmbeddedContent::Ref(stable_content_ref(commit, blob, path))
    }
}
