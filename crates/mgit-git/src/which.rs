// SPDX-License-Identifier: MIT OR Apache-2.0
//! Portable executable discovery in `PATH`, ported from the teacher's
//! `abp-which` microcrate so a misconfigured `PATH` fails fast instead of
//! surfacing an opaque spawn error.

use std::path::{Path, PathBuf};

/// Locate an executable by name, similarly to shell `which`.
///
/// If `bin` contains path separators it is treated as a direct path.
pub fn which(bin: &str) -> Option<PathBuf> {
    let candidate = Path::new(bin);
    if has_path(candidate) {
        return candidate.exists().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| resolve_in_dir(&dir, bin))
}

fn has_path(candidate: &Path) -> bool {
    candidate.components().count() > 1
}

fn resolve_in_dir(dir: &Path, command: &str) -> Option<PathBuf> {
    let direct = dir.join(command);
    if direct.exists() {
        return Some(direct);
    }

    if !cfg!(windows) {
        return None;
    }

    ["", ".exe", ".cmd", ".bat", ".com"]
        .into_iter()
        .map(|ext| dir.join(format!("{command}{ext}")))
        .find(|candidate| candidate.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_resolves_to_none() {
        assert!(which("no-such-binary-mgit").is_none());
    }
}
