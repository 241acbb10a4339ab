#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-pattern
//!
//! The three-segment glob language used to select repositories across
//! providers whose organizational hierarchies differ in depth (2-level
//! org/repo vs. 3-level org/project/repo). A pattern is always written and
//! stored as `org_glob/project_glob/repo_glob`, regardless of whether the
//! providers it ultimately matches against have a `project` level at all.

use globset::GlobBuilder;
use mgit_error::{ErrorCode, MgitError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized, parsed three-segment glob pattern.
///
/// Each segment is a sequence of literal characters plus `*` (zero-or-more
/// non-`/` characters) and `?` (exactly one non-`/` character). Equality and
/// hashing only consider the three glob segments: [`PatternSpec::parse`]
/// followed by [`PatternSpec::render`] round-trips the segments even though
/// the leading/trailing-slash warning flag is a render-time detail, not part
/// of the pattern's identity (see `parse(render(p)) == p`, §8 invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Glob matched against `Repository::organization`.
    pub org_glob: String,
    /// Glob matched against `Repository::project` (3-level providers only).
    pub project_glob: String,
    /// Glob matched against `Repository::name`.
    pub repo_glob: String,
    /// Set when the raw input had a leading and/or trailing `/` stripped
    /// during normalization. Accepted, but surfaced so a host can warn.
    #[serde(default)]
    pub had_slash_warning: bool,
}

impl PartialEq for PatternSpec {
    fn eq(&self, other: &Self) -> bool {
        self.org_glob == other.org_glob
            && self.project_glob == other.project_glob
            && self.repo_glob == other.repo_glob
    }
}

impl Eq for PatternSpec {}

impl fmt::Display for PatternSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org_glob, self.project_glob, self.repo_glob)
    }
}

impl PatternSpec {
    /// Parse and normalize a raw `org/project/repo` pattern string.
    ///
    /// Normalization: the whole input is trimmed of surrounding whitespace,
    /// then a single leading and/or trailing `/` is stripped (accepted, with
    /// [`PatternSpec::had_slash_warning`] set). The remainder must split into
    /// exactly three `/`-separated segments, each of which is trimmed and
    /// must be non-empty after trimming.
    ///
    /// # Errors
    ///
    /// - [`ErrorCode::PatternReasonSegmentCount`] if normalization does not
    ///   yield exactly three segments.
    /// - [`ErrorCode::PatternReasonEmptySegment`] if any segment is empty
    ///   (including consecutive `/` producing an empty interior segment, or
    ///   a segment consisting only of whitespace).
    pub fn parse(input: &str) -> Result<Self, MgitError> {
        let trimmed = input.trim();
        let mut body = trimmed;
        let mut had_slash_warning = false;
        if let Some(rest) = body.strip_prefix('/') {
            body = rest;
            had_slash_warning = true;
        }
        if let Some(rest) = body.strip_suffix('/') {
            body = rest;
            had_slash_warning = true;
        }

        let parts: Vec<&str> = body.split('/').collect();
        if parts.len() != 3 {
            return Err(MgitError::new(
                ErrorCode::PatternReasonSegmentCount,
                format!(
                    "pattern must have exactly three `/`-separated segments, found {}",
                    parts.len()
                ),
            )
            .with_context("input", input));
        }

        let mut segments = [String::new(), String::new(), String::new()];
        for (i, raw) in parts.iter().enumerate() {
            let seg = raw.trim();
            if seg.is_empty() {
                return Err(MgitError::new(
                    ErrorCode::PatternReasonEmptySegment,
                    format!("segment {} of pattern is empty", i + 1),
                )
                .with_context("input", input));
            }
            segments[i] = seg.to_string();
        }

        let [org_glob, project_glob, repo_glob] = segments;
        Ok(Self {
            org_glob,
            project_glob,
            repo_glob,
            had_slash_warning,
        })
    }

    /// Render the pattern back to its canonical `org/project/repo` string.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Match this pattern against a repository identity.
    ///
    /// `project` is `None` for repositories from 2-level providers. Matching
    /// is case-insensitive per segment. For 2-level providers, the project
    /// position matches iff `project_glob` is composed entirely of wildcard
    /// characters (`*`/`?`, e.g. `*` or `?*`) — any literal character in
    /// `project_glob` excludes 2-level providers from consideration, since
    /// there is no project value to test a literal against.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::PatternReasonInvalidGlob`] if a segment does not compile
    /// as a glob (this should not happen for patterns produced by
    /// [`PatternSpec::parse`], which only accepts literal/`*`/`?` segments,
    /// but a `PatternSpec` may also be constructed directly).
    pub fn matches(&self, org: &str, project: Option<&str>, repo: &str) -> Result<bool, MgitError> {
        if !compile_segment(&self.org_glob)?.is_match(org) {
            return Ok(false);
        }
        if !compile_segment(&self.repo_glob)?.is_match(repo) {
            return Ok(false);
        }
        match project {
            Some(p) => Ok(compile_segment(&self.project_glob)?.is_match(p)),
            None => Ok(is_pure_wildcard(&self.project_glob)),
        }
    }

    /// Whether resolving this pattern, absent an explicit provider/URL
    /// selector, must fan out to every registered provider.
    ///
    /// True iff neither `explicit_provider` nor `explicit_url` is set AND
    /// the pattern contains a wildcard character (`*` or `?`) in *any*
    /// segment. This is the corrected rule: an earlier implementation only
    /// inspected the organization segment, which meant a pattern like
    /// `myorg/*/*` incorrectly resolved against a single provider when
    /// `myorg` itself happened to be literal. See spec.md §4.1/§9.
    #[must_use]
    pub fn is_multi_provider(&self, explicit_provider: Option<&str>, explicit_url: Option<&str>) -> bool {
        if explicit_provider.is_some() || explicit_url.is_some() {
            return false;
        }
        [&self.org_glob, &self.project_glob, &self.repo_glob]
            .into_iter()
            .any(|seg| has_wildcard(seg))
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.chars().any(|c| c == '*' || c == '?')
}

fn is_pure_wildcard(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c == '*' || c == '?')
}

fn compile_segment(glob: &str) -> Result<globset::GlobMatcher, MgitError> {
    GlobBuilder::new(glob)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| {
            MgitError::new(
                ErrorCode::PatternReasonInvalidGlob,
                format!("segment does not compile as a glob: {e}"),
            )
            .with_context("segment", glob)
        })
}
