// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parsing for `git diff-tree --name-status` output (spec.md §4.5, §4.8).

/// One line of `git diff-tree -r --name-status -M -C` output.
///
/// `status` is git's raw status letter (`A`, `M`, `D`, `R`, `C`); mapping
/// this into [`mgit_core::ChangeOp`] — including the `R`/`C` split into two
/// logical operations — is the Change Pipeline's job (spec.md §4.8 step 4),
/// not this crate's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// The raw git status letter.
    pub status: char,
    /// Similarity score (0-100) git reported for a rename/copy, if any.
    pub similarity: Option<u8>,
    /// The (new, for renames/copies) path.
    pub path: String,
    /// The original path, present only for `R`/`C` entries.
    pub old_path: Option<String>,
}

/// Parse raw `--name-status` output into [`DiffEntry`] values.
///
/// Tolerant of a trailing newline and blank lines; unparsable lines are
/// skipped rather than causing the whole parse to fail, since a single
/// malformed line should not take down an entire diff enumeration.
#[must_use]
pub fn parse_name_status(output: &str) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let Some(status_field) = fields.next() else {
            continue;
        };
        let Some(status) = status_field.chars().next() else {
            continue;
        };
        let similarity = status_field[status.len_utf8()..].parse::<u8>().ok();

        match status {
            'R' | 'C' => {
                let (Some(old_path), Some(path)) = (fields.next(), fields.next()) else {
                    continue;
                };
                entries.push(DiffEntry {
                    status,
                    similarity,
                    path: path.to_string(),
                    old_path: Some(old_path.to_string()),
                });
            }
            _ => {
                let Some(path) = fields.next() else {
                    continue;
                };
                entries.push(DiffEntry {
                    status,
                    similarity,
                    path: path.to_string(),
                    old_path: None,
                });
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_statuses() {
        let out = "A\tnew.txt\nM\tchanged.txt\nD\tgone.txt\n";
        let entries = parse_name_status(out);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], DiffEntry { status: 'A', similarity: None, path: "new.txt".into(), old_path: None });
        assert_eq!(entries[1].status, 'M');
        assert_eq!(entries[2].status, 'D');
    }

    #[test]
    fn parses_rename_with_similarity_score() {
        let out = "R100\told.txt\tnew.txt\n";
        let entries = parse_name_status(out);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 'R');
        assert_eq!(entries[0].similarity, Some(100));
        assert_eq!(entries[0].old_path.as_deref(), Some("old.txt"));
        assert_eq!(entries[0].path, "new.txt");
    }

    #[test]
    fn parses_copy_entries() {
        let out = "C087\ttemplate.rs\tcopy.rs\n";
        let entries = parse_name_status(out);
        assert_eq!(entries[0].status, 'C');
        assert_eq!(entries[0].similarity, Some(87));
    }

    #[test]
    fn ignores_blank_lines() {
        let out = "A\ta.txt\n\n\nM\tb.txt\n";
        assert_eq!(parse_name_status(out).len(), 2);
    }

    #[test]
    fn empty_output_yields_no_entries() {
        assert!(parse_name_status("").is_empty());
    }
}
