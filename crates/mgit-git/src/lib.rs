#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-git
//!
//! The Git Executor (spec.md C5 / §4.5): a thin async wrapper around the
//! external `git` binary. Every operation is driven by `tokio::process`
//! and bounded by a caller-supplied timeout, mirroring the teacher's
//! `abp-git` crate but replacing its synchronous `std::process::Command`
//! calls with `tokio::process::Command` so the executor composes with the
//! rest of mgit's async pipeline instead of blocking an executor thread.

pub mod classify;
pub mod diff;
mod which;

use classify::classify_stderr;
use diff::DiffEntry;
use mgit_error::{ErrorCode, MgitError};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Default timeout for `clone` (spec.md §5: large repositories may take a
/// while; callers are free to override).
pub const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(600);
/// Default timeout for `pull`.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(120);
/// Default timeout for read-only inspection operations (`status`,
/// `rev-parse`, `diff-tree`).
pub const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Async wrapper around a single `git` binary.
#[derive(Debug, Clone)]
pub struct GitExecutor {
    binary: PathBuf,
}

impl GitExecutor {
    /// Locate `git` on `PATH` and fail fast if it is missing, rather than
    /// letting every subsequent operation fail with an opaque spawn error.
    pub fn discover() -> Result<Self, MgitError> {
        which::which("git").map(|binary| Self { binary }).ok_or_else(|| {
            MgitError::new(ErrorCode::GitUnknown, "git binary not found on PATH")
                .with_context("binary", "git")
        })
    }

    /// Use an explicit path to a `git` binary, bypassing `PATH` discovery.
    #[must_use]
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        op_timeout: Duration,
    ) -> Result<Output, MgitError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        match timeout(op_timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(io_err)) => Err(MgitError::new(
                ErrorCode::GitUnknown,
                format!("failed to spawn git: {io_err}"),
            )
            .with_context("args", args.join(" "))),
            Err(_) => Err(MgitError::new(
                ErrorCode::TimedOut,
                format!("git {} timed out after {:?}", args.join(" "), op_timeout),
            )
            .with_context("args", args.join(" "))),
        }
    }

    fn failure(args: &[&str], output: &Output) -> MgitError {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let code = classify_stderr(&stderr);
        MgitError::new(code, format!("git {} failed", args.join(" ")))
            .with_context("stderr", stderr)
            .with_context("exit_code", output.status.code())
    }

    /// Clone `url` into `dest`, which must not already exist.
    ///
    /// `depth` requests a shallow clone; `None` clones full history.
    pub async fn clone(
        &self,
        url: &str,
        dest: &Path,
        depth: Option<u32>,
        op_timeout: Duration,
    ) -> Result<(), MgitError> {
        let depth_str = depth.map(|d| d.to_string());
        let dest_str = dest.to_string_lossy().into_owned();

        let mut args: Vec<&str> = vec!["clone", "--quiet"];
        if let Some(ref d) = depth_str {
            args.push("--depth");
            args.push(d);
        }
        args.push(url);
        args.push(&dest_str);

        let output = self.run(None, &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(())
    }

    /// Fast-forward `path`'s checked-out branch from its upstream.
    pub async fn pull(&self, path: &Path, op_timeout: Duration) -> Result<(), MgitError> {
        let args = ["pull", "--ff-only", "--quiet"];
        let output = self.run(Some(path), &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(())
    }

    /// Return `git status --porcelain=v1` output, used to detect a dirty
    /// working tree before a destructive operation (spec.md §4.6).
    pub async fn status_porcelain(
        &self,
        path: &Path,
        op_timeout: Duration,
    ) -> Result<String, MgitError> {
        let args = ["status", "--porcelain=v1"];
        let output = self.run(Some(path), &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// A working tree is dirty if its porcelain status output is non-empty.
    #[must_use]
    pub fn is_dirty(status_output: &str) -> bool {
        !status_output.trim().is_empty()
    }

    /// Resolve `HEAD` to its full commit hash.
    pub async fn rev_parse_head(
        &self,
        path: &Path,
        op_timeout: Duration,
    ) -> Result<String, MgitError> {
        let args = ["rev-parse", "HEAD"];
        let output = self.run(Some(path), &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Resolve the branch checked out at `path` (`git rev-parse
    /// --abbrev-ref HEAD`), used by the Change Pipeline (C8) to stamp a new
    /// [`mgit_core::Changeset`]'s `branch` field.
    pub async fn current_branch(
        &self,
        path: &Path,
        op_timeout: Duration,
    ) -> Result<String, MgitError> {
        let args = ["rev-parse", "--abbrev-ref", "HEAD"];
        let output = self.run(Some(path), &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Resolve the blob SHA of `repo_path` as it exists in `commit` (`git
    /// rev-parse <commit>:<repo_path>`), used by the Change Pipeline (C8)
    /// to build a stable `content_ref` for large files whose content is
    /// not embedded inline (spec.md §4.8 step 5: "commit-sha + blob-sha +
    /// path").
    pub async fn blob_sha(
        &self,
        path: &Path,
        commit: &str,
        repo_path: &str,
        op_timeout: Duration,
    ) -> Result<String, MgitError> {
        let spec = format!("{commit}:{repo_path}");
        let args = ["rev-parse", &spec];
        let output = self.run(Some(path), &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Enumerate file-level changes between two commits (or from the empty
    /// tree, when `from` is `None`) via `git diff-tree -r --name-status`.
    ///
    /// Rename/copy detection (`-M -C`) is always enabled; the caller (the
    /// Change Pipeline, C8) is responsible for mapping the returned raw
    /// status letters onto logical add/modify/delete operations.
    pub async fn diff_tree(
        &self,
        path: &Path,
        from: Option<&str>,
        to: &str,
        op_timeout: Duration,
    ) -> Result<Vec<DiffEntry>, MgitError> {
        let mut args: Vec<&str> = vec!["diff-tree", "-r", "--name-status", "-M", "-C"];
        if let Some(f) = from {
            args.push(f);
        }
        args.push(to);

        let output = self.run(Some(path), &args, op_timeout).await?;
        if !output.status.success() {
            return Err(Self::failure(&args, &output));
        }
        Ok(diff::parse_name_status(&String::from_utf8_lossy(&output.stdout)))
    }

    /// True if `path` looks like the root of a git working tree.
    pub async fn is_git_repository(&self, path: &Path, op_timeout: Duration) -> bool {
        let args = ["rev-parse", "--is-inside-work-tree"];
        matches!(self.run(Some(path), &args, op_timeout).await, Ok(output) if output.status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_dirty_detects_nonempty_porcelain_output() {
        assert!(!GitExecutor::is_dirty(""));
        assert!(!GitExecutor::is_dirty("   \n"));
        assert!(GitExecutor::is_dirty(" M src/lib.rs\n"));
    }

    #[tokio::test]
    async fn discover_or_with_binary_constructs_executor() {
        // Either git is on PATH (discover succeeds) or we fall back to a
        // plausible explicit path; this only checks construction works.
        let exec = GitExecutor::discover().unwrap_or_else(|_| GitExecutor::with_binary("/usr/bin/git"));
        assert!(exec.binary.to_string_lossy().contains("git"));
    }

    #[tokio::test]
    async fn unknown_binary_rev_parse_fails_with_spawn_error() {
        let exec = GitExecutor::with_binary("mgit-definitely-not-a-real-binary");
        let result = exec
            .rev_parse_head(Path::new("."), Duration::from_secs(5))
            .await;
        assert!(result.is_err());
    }
}
