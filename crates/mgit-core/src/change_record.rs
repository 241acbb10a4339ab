// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`ChangeRecord`] line-delimited JSON stream unit (spec.md §3, §6).

use serde::{Deserialize, Serialize};

/// The kind of file-level change a [`FileOpRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// A new file was added.
    Add,
    /// An existing file's content changed.
    Modify,
    /// A file was removed.
    Delete,
}

/// A single file-level operation within one repository's change stream.
///
/// `repo` is the repository's [`RepositoryIdentity::stable_hash`](crate::RepositoryIdentity::stable_hash),
/// not the full identity tuple, keeping stream lines compact; hosts that
/// need the full identity look it up via the Changeset Store manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOpRecord {
    /// Stable identity-hash of the owning repository.
    pub repo: String,
    /// What kind of change this is.
    pub op: ChangeOp,
    /// Repository-relative file path.
    pub path: String,
    /// File size in bytes, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    /// Inferred MIME type, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mime: Option<String>,
    /// UTF-8 text content, for small decodable text files.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<String>,
    /// Base64-encoded content, for small binary or mid-size files.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_base64: Option<String>,
    /// A stable out-of-band reference (`commit:blob:path`) for large files
    /// whose content is not embedded inline.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_ref: Option<String>,
    /// Set when the file was classified as binary and should be excluded
    /// from any downstream full-text index.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub skip_index: Option<bool>,
}

impl FileOpRecord {
    /// Construct a record with only the required fields set.
    #[must_use]
    pub fn new(repo: impl Into<String>, op: ChangeOp, path: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            op,
            path: path.into(),
            size: None,
            mime: None,
            content: None,
            content_base64: None,
            content_ref: None,
            skip_index: None,
        }
    }
}

/// The new anchor recorded by a [`CompletionRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChangesetRef {
    /// HEAD commit the emission ran against.
    pub commit: String,
    /// The anchor's previous commit, if any.
    pub parent: Option<String>,
    /// Branch the emission ran against.
    pub branch: String,
}

/// Emitted exactly once per repository, after all of its file operations,
/// marking the new changeset anchor the Changeset Store will persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Stable identity-hash of the owning repository.
    pub repo: String,
    /// The anchor to persist once this repository's stream is fully
    /// accepted by the consumer.
    pub new_changeset: NewChangesetRef,
}

/// A unit of the Change Pipeline's output stream: either a file operation
/// or a repository's completion marker. Within one repository's stream,
/// file ops precede the completion marker; across repositories,
/// interleaving is permitted (spec.md §3 invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum ChangeRecord {
    /// A file-level add/modify/delete.
    FileOp(FileOpRecord),
    /// The completion marker for one repository.
    Completion(CompletionRecord),
}

impl ChangeRecord {
    /// The owning repository's identity-hash, common to both variants.
    #[must_use]
    pub fn repo(&self) -> &str {
        match self {
            Self::FileOp(r) => &r.repo,
            Self::Completion(r) => &r.repo,
        }
    }

    /// `true` for the [`ChangeRecord::Completion`] variant.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion(_))
    }
}

/// Optional first line of an output stream, declaring stream-level metadata
/// (spec.md §6 "The first line of a stream may optionally be a header").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeader {
    /// Stream format version.
    pub version: u32,
    /// Compression scheme applied to the remaining lines, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub compression: Option<String>,
    /// When the stream was generated.
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Wraps a [`StreamHeader`] so it serializes with the same `{header: {...}}`
/// envelope described in spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHeaderLine {
    /// The header payload.
    pub header: StreamHeader,
}
