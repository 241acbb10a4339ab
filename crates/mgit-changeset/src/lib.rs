#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-changeset
//!
//! The Changeset Store (spec.md C7 / §4.7): a file-per-repository JSON
//! store keyed by `RepositoryIdentity::stable_hash()`, grounded on the
//! teacher's `abp-runtime::store::ReceiptStore` file layout (one JSON file
//! per record, under a root directory), extended with the atomic
//! temp-file-then-rename write spec.md §4.7 requires ("readers see either
//! the prior or the new value, never a partial one") that the teacher's
//! receipt store did not itself need, since receipts are written once and
//! never overwritten.
//!
//! A sidecar manifest (spec.md §6 "a sidecar manifest enumerates the
//! current set of known repositories") is maintained alongside the
//! per-repository files so callers can enumerate known identities without
//! reading every changeset file.

use mgit_core::{Changeset, RepositoryIdentity};
use mgit_error::{ErrorCode, MgitError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    entries: BTreeMap<String, RepositoryIdentity>,
}

/// A file-based, atomically-written store of per-repository [`Changeset`]
/// anchors.
///
/// Concurrency: spec.md §4.7 assigns the Change Pipeline (C8) the
/// responsibility of serializing writers per repository ("one writer per
/// repository at a time"); the store itself only guarantees that the
/// manifest update accompanying each write is internally consistent across
/// concurrent repositories, via a single in-process mutex.
pub struct ChangesetStore {
    root: PathBuf,
    manifest_lock: Mutex<()>,
}

impl ChangesetStore {
    /// Open (or lazily create, on first write) a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifest_lock: Mutex::new(()),
        }
    }

    fn changeset_path(&self, identity: &RepositoryIdentity) -> PathBuf {
        self.root.join(format!("{}.json", identity.stable_hash()))
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Read the current anchor for `identity`, or `None` if none has ever
    /// been recorded (spec.md §4.8 step 1: "If absent, anchor is the empty
    /// tree").
    pub async fn get(&self, identity: &RepositoryIdentity) -> Result<Option<Changeset>, MgitError> {
        let path = self.changeset_path(identity);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let changeset: Changeset = serde_json::from_slice(&bytes)
                    .map_err(|e| storage_error(format!("corrupt changeset at {}: {e}", path.display())))?;
                Ok(Some(changeset))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(format!("failed to read {}: {e}", path.display()))),
        }
    }

    /// Persist `changeset`, staging to a temporary file and renaming into
    /// place so readers never observe a partially-written file, then update
    /// the sidecar manifest the same way.
    pub async fn put_atomic(&self, changeset: &Changeset) -> Result<(), MgitError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| storage_error(format!("failed to create {}: {e}", self.root.display())))?;

        let path = self.changeset_path(&changeset.repository);
        let bytes = serde_json::to_vec_pretty(changeset)
            .map_err(|e| storage_error(format!("failed to encode changeset: {e}")))?;
        write_atomic(&path, &bytes).await?;

        let _guard = self.manifest_lock.lock().await;
        let mut manifest = self.read_manifest().await?;
        manifest
            .entries
            .insert(changeset.repository.stable_hash(), changeset.repository.clone());
        self.write_manifest(&manifest).await?;
        tracing::debug!(repository = %changeset.repository, commit = %changeset.commit, "changeset anchor persisted");
        Ok(())
    }

    /// Remove a repository's anchor and manifest entry, if present.
    pub async fn delete(&self, identity: &RepositoryIdentity) -> Result<(), MgitError> {
        let path = self.changeset_path(identity);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(storage_error(format!("failed to remove {}: {e}", path.display()))),
        }

        let _guard = self.manifest_lock.lock().await;
        let mut manifest = self.read_manifest().await?;
        manifest.entries.remove(&identity.stable_hash());
        self.write_manifest(&manifest).await
    }

    /// Enumerate every repository identity currently known to the store, in
    /// stable-hash order, via the sidecar manifest rather than a directory
    /// scan.
    pub async fn iterate(&self) -> Result<Vec<RepositoryIdentity>, MgitError> {
        let manifest = self.read_manifest().await?;
        Ok(manifest.entries.into_values().collect())
    }

    async fn read_manifest(&self) -> Result<Manifest, MgitError> {
        let path = self.manifest_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| storage_error(format!("corrupt manifest at {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(storage_error(format!("failed to read {}: {e}", path.display()))),
        }
    }

    async fn write_manifest(&self, manifest: &Manifest) -> Result<(), MgitError> {
        let bytes = serde_json::to_vec_pretty(manifest)
            .map_err(|e| storage_error(format!("failed to encode manifest: {e}")))?;
        write_atomic(&self.manifest_path(), &bytes).await
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MgitError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_name = format!(".{}.tmp-{}", path.file_name().and_then(|n| n.to_str()).unwrap_or("changeset"), std::process::id());
    let tmp_path = parent.join(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| storage_error(format!("failed to write {}: {e}", tmp_path.display())))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| storage_error(format!("failed to rename {} into place: {e}", tmp_path.display())))?;
    Ok(())
}

fn storage_error(message: impl Into<String>) -> MgitError {
    MgitError::new(ErrorCode::StorageError, message)
}
