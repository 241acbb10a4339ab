// SPDX-License-Identifier: MIT OR Apache-2.0
//! Record validation levels and recovery strategies (spec.md §4.8
//! "Validation levels" / "Recovery strategies").

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use mgit_core::{ChangeOp, CompletionRecord, FileOpRecord};
use sha2::{Digest, Sha256};

/// How thoroughly a [`FileOpRecord`] or [`CompletionRecord`] is checked
/// before being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationLevel {
    /// Required fields only: non-empty `path`, a present `op`.
    Basic,
    /// `Basic`, plus declared `size` matches embedded content size.
    Standard,
    /// `Standard`, plus a recomputed content hash and (for the completion
    /// record) parent-continuity against the previous anchor.
    Strict,
}

/// One problem found validating a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// `path` was empty.
    EmptyPath,
    /// The declared `size` did not match the decoded embedded content's
    /// byte length.
    SizeMismatch {
        /// The `size` field as declared on the record.
        declared: u64,
        /// The actual decoded byte length of the embedded content.
        actual: u64,
    },
    /// A recomputed sha256 of the decoded content did not match the
    /// expected hash computed at embed time.
    ContentHashMismatch,
    /// The completion record's `parent` did not match the previous
    /// anchor's commit.
    ParentDiscontinuity {
        /// What the previous anchor's commit actually was.
        expected: Option<String>,
        /// What the completion record's `parent` field said.
        found: Option<String>,
    },
}

fn decoded_len(record: &FileOpRecord) -> Option<u64> {
    if let Some(text) = &record.content {
        return Some(text.len() as u64);
    }
    if let Some(b64) = &record.content_base64 {
        return BASE64.decode(b64).ok().map(|bytes| bytes.len() as u64);
    }
    None
}

fn decoded_bytes(record: &FileOpRecord) -> Option<Vec<u8>> {
    if let Some(text) = &record.content {
        return Some(text.as_bytes().to_vec());
    }
    if let Some(b64) = &record.content_base64 {
        return BASE64.decode(b64).ok();
    }
    None
}

/// Hex-encoded sha256 of `bytes`, used both to compute the hash a `Strict`
/// validation pass expects and to check a record's embedded content
/// against it.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write as _;
        let mut s = String::new();
        for b in bytes.as_ref() {
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

/// Validate one [`FileOpRecord`] at `level`, optionally checking its
/// embedded content against `expected_hash` (only consulted at
/// [`ValidationLevel::Strict`]).
#[must_use]
pub fn validate_file_op(record: &FileOpRecord, expected_hash: Option<&str>, level: ValidationLevel) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if record.path.trim().is_empty() {
        issues.push(ValidationIssue::EmptyPath);
    }

    if level >= ValidationLevel::Standard {
        if let Some(declared) = record.size {
            if let Some(actual) = decoded_len(record) {
                if actual != declared {
                    issues.push(ValidationIssue::SizeMismatch { declared, actual });
                }
            }
        }
    }

    if level >= ValidationLevel::Strict {
        if let Some(expected) = expected_hash {
            if let Some(bytes) = decoded_bytes(record) {
                if content_hash(&bytes) != expected {
                    issues.push(ValidationIssue::ContentHashMismatch);
                }
            }
        }
    }

    issues
}

/// Validate a [`CompletionRecord`] against the previous anchor's commit
/// (only meaningful at [`ValidationLevel::Strict`]; earlier levels never
/// produce a [`ValidationIssue::ParentDiscontinuity`]).
#[must_use]
pub fn validate_completion(record: &CompletionRecord, previous_anchor_commit: Option<&str>, level: ValidationLevel) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if level >= ValidationLevel::Strict {
        let expected = previous_anchor_commit.map(str::to_string);
        if record.new_changeset.parent != expected {
            issues.push(ValidationIssue::ParentDiscontinuity {
                expected,
                found: record.new_changeset.parent.clone(),
            });
        }
    }
    issues
}

/// How a per-record validation failure is handled (spec.md §4.8 "Recovery
/// strategies"), configurable per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Drop the record silently.
    Ignore,
    /// Fill in sane defaults, re-derive `size`, and shrink oversize/
    /// unverifiable content down to `content_ref`.
    Repair,
    /// Replace the record with a minimal one carrying only `op` and
    /// `path`.
    Fallback,
    /// Stop processing this repository entirely; its new anchor is not
    /// committed.
    Abort,
}

/// The result of applying a [`RecoveryStrategy`] to an invalid record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The record was valid, or was repaired into a usable one.
    Keep(FileOpRecord),
    /// The record was dropped per `Ignore`.
    Dropped,
    /// The record was replaced with a minimal fallback.
    Fallback(FileOpRecord),
    /// The repository's emission must stop; no anchor is committed.
    Abort,
}

/// Apply `strategy` to `record` given the `issues` found validating it. An
/// empty `issues` list always keeps the record unchanged regardless of
/// `strategy`.
#[must_use]
pub fn recover_file_op(mut record: FileOpRecord, issues: &[ValidationIssue], strategy: RecoveryStrategy) -> RecoveryOutcome {
    if issues.is_empty() {
        return RecoveryOutcome::Keep(record);
    }

    match strategy {
        RecoveryStrategy::Ignore => RecoveryOutcome::Dropped,
        RecoveryStrategy::Abort => RecoveryOutcome::Abort,
        RecoveryStrategy::Fallback => {
            let minimal = FileOpRecord::new(record.repo.clone(), record.op, record.path.clone());
            RecoveryOutcome::Keep(minimal)
        }
        RecoveryStrategy::Repair => {
            for issue in issues {
                match issue {
                    ValidationIssue::SizeMismatch { actual, .. } => {
                        record.size = Some(*actual);
                    }
                    ValidationIssue::ContentHashMismatch => {
                        // Unverifiable content is worse than no content: drop
                        // it down to a reference rather than ship bytes that
                        // don't match their declared hash.
                        if record.op != ChangeOp::Delete {
                            record.content = None;
                            record.content_base64 = None;
                        }
                    }
                    ValidationIssue::EmptyPath | ValidationIssue::ParentDiscontinuity { .. } => {}
                }
            }

            // Re-derive mime/skip_index against whatever content survived the
            // fixes above, rather than trusting a declaration that already
            // proved unreliable.
            let bytes = decoded_bytes(&record).unwrap_or_default();
            let classification = crate::mime::classify(&record.path, &bytes);
            record.mime = classification.mime;
            record.skip_index = Some(classification.is_binary);

            RecoveryOutcome::Keep(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_text(path: &str, text: &str, declared_size: u64) -> FileOpRecord {
        let mut r = FileOpRecord::new("repo1", ChangeOp::Add, path);
        r.content = Some(text.to_string());
        r.size = Some(declared_size);
        r
    }

    #[test]
    fn basic_level_only_checks_empty_path() {
        let r = record_with_text("", "hi", 99);
        let issues = validate_file_op(&r, None, ValidationLevel::Basic);
        assert_eq!(issues, vec![ValidationIssue::EmptyPath]);
    }

    #[test]
    fn standard_level_catches_size_mismatch() {
        let r = record_with_text("a.txt", "hello", 999);
        let issues = validate_file_op(&r, None, ValidationLevel::Standard);
        assert_eq!(issues, vec![ValidationIssue::SizeMismatch { declared: 999, actual: 5 }]);
    }

    #[test]
    fn standard_level_passes_when_size_matches() {
        let r = record_with_text("a.txt", "hello", 5);
        assert!(validate_file_op(&r, None, ValidationLevel::Standard).is_empty());
    }

    #[test]
    fn strict_level_catches_content_hash_mismatch() {
        let r = record_with_text("a.txt", "hello", 5);
        let wrong_hash = content_hash(b"goodbye");
        let issues = validate_file_op(&r, Some(&wrong_hash), ValidationLevel::Strict);
        assert!(issues.contains(&ValidationIssue::ContentHashMismatch));
    }

    #[test]
    fn strict_level_passes_with_matching_hash() {
        let r = record_with_text("a.txt", "hello", 5);
        let right_hash = content_hash(b"hello");
        assert!(validate_file_op(&r, Some(&right_hash), ValidationLevel::Strict).is_empty());
    }

    #[test]
    fn completion_parent_discontinuity_only_flagged_at_strict() {
        use mgit_core::NewChangesetRef;
        let completion = CompletionRecord {
            repo: "repo1".to_string(),
            new_changeset: NewChangesetRef {
                commit: "head".to_string(),
                parent: Some("stale".to_string()),
                branch: "main".to_string(),
            },
        };
        assert!(validate_completion(&completion, Some("actual"), ValidationLevel::Standard).is_empty());
        let issues = validate_completion(&completion, Some("actual"), ValidationLevel::Strict);
        assert_eq!(
            issues,
            vec![ValidationIssue::ParentDiscontinuity {
                expected: Some("actual".to_string()),
                found: Some("stale".to_string()),
            }]
        );
    }

    #[test]
    fn recover_ignore_drops_invalid_record() {
        let r = record_with_text("", "hi", 2);
        let issues = validate_file_op(&r, None, ValidationLevel::Basic);
        assert_eq!(recover_file_op(r, &issues, RecoveryStrategy::Ignore), RecoveryOutcome::Dropped);
    }

    #[test]
    fn recover_abort_stops_the_repository() {
        let r = record_with_text("", "hi", 2);
        let issues = validate_file_op(&r, None, ValidationLevel::Basic);
        assert_eq!(recover_file_op(r, &issues, RecoveryStrategy::Abort), RecoveryOutcome::Abort);
    }

    #[test]
    fn recover_fallback_keeps_only_op_and_path() {
        let r = record_with_text("a.txt", "hello", 999);
        let issues = validate_file_op(&r, None, ValidationLevel::Standard);
        match recover_file_op(r, &issues, RecoveryStrategy::Fallback) {
            RecoveryOutcome::Keep(minimal) => {
                assert_eq!(minimal.path, "a.txt");
                assert!(minimal.content.is_none());
                assert!(minimal.size.is_none());
            }
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn recover_repair_fixes_declared_size() {
        let r = record_with_text("a.txt", "hello", 999);
        let issues = validate_file_op(&r, None, ValidationLevel::Standard);
        match recover_file_op(r, &issues, RecoveryStrategy::Repair) {
            RecoveryOutcome::Keep(repaired) => assert_eq!(repaired.size, Some(5)),
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn recover_repair_rederives_mime_and_skip_index() {
        let mut r = record_with_text("a.txt", "hello", 999);
        r.mime = Some("application/x-stale".to_string());
        let issues = validate_file_op(&r, None, ValidationLevel::Standard);
        match recover_file_op(r, &issues, RecoveryStrategy::Repair) {
            RecoveryOutcome::Keep(repaired) => {
                assert_eq!(repaired.mime.as_deref(), Some("text/plain"));
                assert_eq!(repaired.skip_index, Some(false));
            }
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn recover_repair_strips_unverifiable_content() {
        let r = record_with_text("a.txt", "hello", 5);
        let wrong_hash = content_hash(b"goodbye");
        let issues = validate_file_op(&r, Some(&wrong_hash), ValidationLevel::Strict);
        match recover_file_op(r, &issues, RecoveryStrategy::Repair) {
            RecoveryOutcome::Keep(repaired) => assert!(repaired.content.is_none()),
            other => panic!("expected Keep, got {other:?}"),
        }
    }

    #[test]
    fn valid_record_is_kept_unchanged_regardless_of_strategy() {
        let r = record_with_text("a.txt", "hello", 5);
        for strategy in [RecoveryStrategy::Ignore, RecoveryStrategy::Repair, RecoveryStrategy::Fallback, RecoveryStrategy::Abort] {
            let issues = validate_file_op(&r, None, ValidationLevel::Standard);
            assert_eq!(recover_file_op(r.clone(), &issues, strategy), RecoveryOutcome::Keep(r.clone()));
        }
    }
}
