//! Recursive reconciliation of a replica tree against its source

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::{MirrorError, Result};
use crate::event_log::EventLog;
use crate::hasher::{FileHasher, HashAlgorithm};

/// Corrective actions applied to the replica during a pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MirrorAction {
    /// Copy a source file into the replica
    CopyFile { source: PathBuf, replica: PathBuf },
    /// Delete a replica file with no source counterpart
    DeleteFile { path: PathBuf },
    /// Create a replica directory
    CreateDirectory { path: PathBuf },
    /// Delete a replica directory tree with no source counterpart
    DeleteDirectory { path: PathBuf },
}

/// Options for mirroring passes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorOptions {
    /// Digest used for change detection
    pub hash_algorithm: HashAlgorithm,
    /// Buffer size for hashing reads
    pub buffer_size: usize,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            buffer_size: 64 * 1024, // 64KB
        }
    }
}

/// Summary of one mirroring pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    pub files_copied: usize,
    pub files_deleted: usize,
    pub dirs_created: usize,
    pub dirs_deleted: usize,
    pub files_unchanged: usize,
    pub bytes_copied: u64,
    pub errors: usize,
}

impl Default for PassSummary {
    fn default() -> Self {
        Self {
            files_copied: 0,
            files_deleted: 0,
            dirs_created: 0,
            dirs_deleted: 0,
            files_unchanged: 0,
            bytes_copied: 0,
            errors: 0,
        }
    }
}

impl PassSummary {
    /// Total number of corrective actions applied to the replica
    pub fn actions(&self) -> usize {
        self.files_copied + self.files_deleted + self.dirs_created + self.dirs_deleted
    }

    /// True when the replica already matched the source and nothing failed
    pub fn is_clean(&self) -> bool {
        self.actions() == 0 && self.errors == 0
    }
}

/// What currently occupies an entry's name in the replica
enum ReplicaEntry {
    File,
    Directory,
    Missing,
}

/// One directory level, split into files and subdirectories
///
/// Sorted by name so actions are applied (and logged) in a stable order.
#[derive(Default)]
struct DirListing {
    files: BTreeMap<OsString, PathBuf>,
    dirs: BTreeMap<OsString, PathBuf>,
}

/// One-way reconciler that makes the replica tree match the source tree
///
/// Files are compared by content digest, never by timestamps or size. Each
/// corrective action is applied immediately and recorded in the audit log.
/// A failure handling one entry is logged and counted, and the pass moves on
/// to the remaining entries.
pub struct Reconciler {
    source_root: PathBuf,
    replica_root: PathBuf,
    hasher: FileHasher,
    log: EventLog,
}

impl Reconciler {
    /// Create a reconciler for a source/replica pair
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        options: MirrorOptions,
        log: EventLog,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            hasher: FileHasher::with_buffer_size(options.hash_algorithm, options.buffer_size),
            log,
        }
    }

    /// Directory that is mirrored from
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Directory that is mirrored into
    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    /// Run one full mirroring pass over the tree
    ///
    /// The replica root is created if missing. An unreadable or missing
    /// source root fails the whole pass; failures below the roots only
    /// fail the entries they touch.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let source_metadata = fs::metadata(&self.source_root).await.map_err(|e| {
            MirrorError::scan_error(
                &self.source_root,
                format!("Source directory is not accessible: {}", e),
            )
        })?;

        if !source_metadata.is_dir() {
            return Err(MirrorError::scan_error(
                &self.source_root,
                "Source path is not a directory",
            ));
        }

        fs::create_dir_all(&self.replica_root).await.map_err(|e| {
            MirrorError::creation_error(
                &self.replica_root,
                format!("Failed to create replica directory: {}", e),
            )
        })?;

        let mut summary = PassSummary::default();
        self.mirror_directory(&self.source_root, &self.replica_root, &mut summary)
            .await?;

        Ok(summary)
    }

    /// Reconcile a single directory level, then descend into subdirectories
    async fn mirror_directory(
        &self,
        source_dir: &Path,
        replica_dir: &Path,
        summary: &mut PassSummary,
    ) -> Result<()> {
        let source = self.list_directory(source_dir, summary).await?;
        let replica = self.list_directory(replica_dir, summary).await?;

        // Files present in the source: copy new ones, overwrite changed ones
        for (name, source_path) in &source.files {
            let replica_path = replica_dir.join(name);
            let existing = if replica.dirs.contains_key(name) {
                ReplicaEntry::Directory
            } else if replica.files.contains_key(name) {
                ReplicaEntry::File
            } else {
                ReplicaEntry::Missing
            };

            if let Err(e) = self
                .mirror_file(source_path, &replica_path, existing, summary)
                .await
            {
                warn!("Failed to mirror '{}': {}", source_path.display(), e);
                summary.errors += 1;
            }
        }

        // Replica files with no source counterpart are deleted
        for (name, replica_path) in &replica.files {
            if source.files.contains_key(name) {
                continue;
            }

            let action = MirrorAction::DeleteFile {
                path: replica_path.clone(),
            };
            if let Err(e) = self.apply(action, summary).await {
                warn!("Failed to delete '{}': {}", replica_path.display(), e);
                summary.errors += 1;
            }
        }

        // Source subdirectories are created in the replica and descended into
        for (name, source_path) in &source.dirs {
            let replica_path = replica_dir.join(name);

            if !replica.dirs.contains_key(name) {
                let action = MirrorAction::CreateDirectory {
                    path: replica_path.clone(),
                };
                if let Err(e) = self.apply(action, summary).await {
                    warn!("Failed to create '{}': {}", replica_path.display(), e);
                    summary.errors += 1;
                    continue;
                }
            }

            if let Err(e) =
                Box::pin(self.mirror_directory(source_path, &replica_path, summary)).await
            {
                warn!(
                    "Failed to mirror directory '{}': {}",
                    source_path.display(),
                    e
                );
                summary.errors += 1;
            }
        }

        // Replica subdirectories with no source counterpart are removed.
        // A directory shadowed by a source file was already replaced above.
        for (name, replica_path) in &replica.dirs {
            if source.dirs.contains_key(name) || source.files.contains_key(name) {
                continue;
            }

            let action = MirrorAction::DeleteDirectory {
                path: replica_path.clone(),
            };
            if let Err(e) = self.apply(action, summary).await {
                warn!("Failed to delete '{}': {}", replica_path.display(), e);
                summary.errors += 1;
            }
        }

        Ok(())
    }

    /// Bring one replica file in line with its source counterpart
    async fn mirror_file(
        &self,
        source_path: &Path,
        replica_path: &Path,
        existing: ReplicaEntry,
        summary: &mut PassSummary,
    ) -> Result<()> {
        match existing {
            ReplicaEntry::Directory => {
                // A stale directory occupies the file's name
                let action = MirrorAction::DeleteDirectory {
                    path: replica_path.to_path_buf(),
                };
                self.apply(action, summary).await?;
            }
            ReplicaEntry::File => {
                let source_hash = self.hasher.hash_file(source_path).await?;

                // An unreadable replica copy is replaced like a changed file
                let unchanged = match self.hasher.hash_file(replica_path).await {
                    Ok(replica_hash) => replica_hash == source_hash,
                    Err(e) => {
                        warn!(
                            "Replacing unreadable replica copy '{}': {}",
                            replica_path.display(),
                            e
                        );
                        false
                    }
                };

                if unchanged {
                    summary.files_unchanged += 1;
                    return Ok(());
                }

                let action = MirrorAction::DeleteFile {
                    path: replica_path.to_path_buf(),
                };
                self.apply(action, summary).await?;
            }
            ReplicaEntry::Missing => {}
        }

        let action = MirrorAction::CopyFile {
            source: source_path.to_path_buf(),
            replica: replica_path.to_path_buf(),
        };
        self.apply(action, summary).await
    }

    /// Apply one corrective action and record it in the audit log
    ///
    /// Copies record the source path; deletions and directory creations
    /// record the replica path.
    async fn apply(&self, action: MirrorAction, summary: &mut PassSummary) -> Result<()> {
        match action {
            MirrorAction::CopyFile { source, replica } => {
                let bytes = fs::copy(&source, &replica).await.map_err(|e| {
                    MirrorError::copy_error(&source, &replica, format!("Failed to copy file: {}", e))
                })?;

                summary.files_copied += 1;
                summary.bytes_copied += bytes;
                self.record("Copied", source.display()).await;
            }
            MirrorAction::DeleteFile { path } => {
                fs::remove_file(&path).await.map_err(|e| {
                    MirrorError::deletion_error(&path, format!("Failed to delete file: {}", e))
                })?;

                summary.files_deleted += 1;
                self.record("Deleted", path.display()).await;
            }
            MirrorAction::CreateDirectory { path } => {
                fs::create_dir_all(&path).await.map_err(|e| {
                    MirrorError::creation_error(&path, format!("Failed to create directory: {}", e))
                })?;

                summary.dirs_created += 1;
                self.record("Created", path.display()).await;
            }
            MirrorAction::DeleteDirectory { path } => {
                fs::remove_dir_all(&path).await.map_err(|e| {
                    MirrorError::deletion_error(&path, format!("Failed to delete directory: {}", e))
                })?;

                summary.dirs_deleted += 1;
                self.record("Deleted", path.display()).await;
            }
        }

        Ok(())
    }

    /// List one directory level, split into files and subdirectories
    async fn list_directory(&self, path: &Path, summary: &mut PassSummary) -> Result<DirListing> {
        let mut listing = DirListing::default();

        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| MirrorError::scan_error(path, format!("Failed to read directory: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            MirrorError::scan_error(path, format!("Failed to read directory entry: {}", e))
        })? {
            let entry_path = entry.path();

            // Follows symlinks, so a link counts as whatever it points at
            match fs::metadata(&entry_path).await {
                Ok(metadata) if metadata.is_dir() => {
                    listing.dirs.insert(entry.file_name(), entry_path);
                }
                Ok(_) => {
                    listing.files.insert(entry.file_name(), entry_path);
                }
                // A dangling link has no target metadata but still occupies
                // its name; it counts as a file so deletion can reach it
                Err(e) => match fs::symlink_metadata(&entry_path).await {
                    Ok(_) => {
                        listing.files.insert(entry.file_name(), entry_path);
                    }
                    Err(_) => {
                        warn!("Skipping unreadable entry '{}': {}", entry_path.display(), e);
                        summary.errors += 1;
                    }
                },
            }
        }

        Ok(listing)
    }

    /// Audit failures must not fail the pass that produced them
    async fn record(&self, action: &str, detail: impl Display) {
        if let Err(e) = self.log.record(action, detail).await {
            warn!("Failed to record audit event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    async fn new_reconciler(temp_dir: &TempDir) -> (Reconciler, PathBuf, PathBuf) {
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir_all(&source).await.unwrap();

        let log = EventLog::open(temp_dir.path().join("events.log"))
            .await
            .unwrap();
        let reconciler = Reconciler::new(&source, &replica, MirrorOptions::default(), log);
        (reconciler, source, replica)
    }

    #[tokio::test]
    async fn test_initial_pass_copies_tree() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("file1.txt"), b"content1").await.unwrap();
        fs::create_dir_all(source.join("docs")).await.unwrap();
        fs::write(source.join("docs").join("file2.txt"), b"content2")
            .await
            .unwrap();

        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.files_copied, 2);
        assert_eq!(summary.dirs_created, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(
            fs::read(replica.join("file1.txt")).await.unwrap(),
            b"content1"
        );
        assert_eq!(
            fs::read(replica.join("docs").join("file2.txt")).await.unwrap(),
            b"content2"
        );
    }

    #[tokio::test]
    async fn test_second_pass_is_clean() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, _replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("file1.txt"), b"content1").await.unwrap();

        reconciler.run_pass().await.unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert!(summary.is_clean());
        assert_eq!(summary.files_unchanged, 1);
    }

    #[tokio::test]
    async fn test_changed_file_is_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("file1.txt"), b"old content").await.unwrap();
        reconciler.run_pass().await.unwrap();

        fs::write(source.join("file1.txt"), b"new content").await.unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.files_copied, 1);
        assert_eq!(
            fs::read(replica.join("file1.txt")).await.unwrap(),
            b"new content"
        );
    }

    #[tokio::test]
    async fn test_same_content_is_not_copied_again() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("file1.txt"), b"content").await.unwrap();
        reconciler.run_pass().await.unwrap();

        // Rewrite with identical bytes so only the timestamp moves
        fs::write(source.join("file1.txt"), b"content").await.unwrap();
        fs::write(replica.join("file1.txt"), b"content").await.unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert!(summary.is_clean());
        assert_eq!(summary.files_unchanged, 1);
    }

    #[tokio::test]
    async fn test_orphan_file_is_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("keep.txt"), b"keep").await.unwrap();
        reconciler.run_pass().await.unwrap();

        fs::write(replica.join("orphan.txt"), b"orphan").await.unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert!(!replica.join("orphan.txt").exists());
        assert!(replica.join("keep.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_orphan_is_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, _source, replica) = new_reconciler(&temp_dir).await;

        reconciler.run_pass().await.unwrap();
        // exists() follows the link, so only symlink_metadata can see it
        fs::symlink("missing-target", replica.join("broken"))
            .await
            .unwrap();

        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.errors, 0);
        assert!(fs::symlink_metadata(replica.join("broken")).await.is_err());

        let second = reconciler.run_pass().await.unwrap();
        assert!(second.is_clean());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_under_source_name_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        reconciler.run_pass().await.unwrap();
        fs::symlink("missing-target", replica.join("data.txt"))
            .await
            .unwrap();

        fs::write(source.join("data.txt"), b"real bytes").await.unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.files_copied, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(
            fs::read(replica.join("data.txt")).await.unwrap(),
            b"real bytes"
        );
    }

    #[tokio::test]
    async fn test_orphan_directory_is_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, _source, replica) = new_reconciler(&temp_dir).await;

        reconciler.run_pass().await.unwrap();

        fs::create_dir_all(replica.join("stale").join("nested"))
            .await
            .unwrap();
        fs::write(replica.join("stale").join("nested").join("old.txt"), b"old")
            .await
            .unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.dirs_deleted, 1);
        assert!(!replica.join("stale").exists());
    }

    #[tokio::test]
    async fn test_file_replaces_directory_of_same_name() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        reconciler.run_pass().await.unwrap();
        fs::create_dir_all(replica.join("entry")).await.unwrap();
        fs::write(replica.join("entry").join("inner.txt"), b"inner")
            .await
            .unwrap();

        fs::write(source.join("entry"), b"now a file").await.unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.dirs_deleted, 1);
        assert_eq!(summary.files_copied, 1);
        assert_eq!(fs::read(replica.join("entry")).await.unwrap(), b"now a file");
    }

    #[tokio::test]
    async fn test_directory_replaces_file_of_same_name() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        reconciler.run_pass().await.unwrap();
        fs::write(replica.join("entry"), b"was a file").await.unwrap();

        fs::create_dir_all(source.join("entry")).await.unwrap();
        fs::write(source.join("entry").join("inner.txt"), b"inner")
            .await
            .unwrap();
        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.dirs_created, 1);
        assert_eq!(summary.files_copied, 1);
        assert_eq!(
            fs::read(replica.join("entry").join("inner.txt")).await.unwrap(),
            b"inner"
        );
    }

    #[tokio::test]
    async fn test_missing_source_root_fails_pass() {
        let temp_dir = TempDir::new().unwrap();
        let replica = temp_dir.path().join("replica");

        let log = EventLog::open(temp_dir.path().join("events.log"))
            .await
            .unwrap();
        let reconciler = Reconciler::new(
            temp_dir.path().join("missing"),
            &replica,
            MirrorOptions::default(),
            log,
        );

        let result = reconciler.run_pass().await;
        assert!(matches!(result, Err(MirrorError::DirectoryScan { .. })));
    }

    #[tokio::test]
    async fn test_source_root_must_be_directory() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        fs::write(&source, b"not a directory").await.unwrap();

        let log = EventLog::open(temp_dir.path().join("events.log"))
            .await
            .unwrap();
        let reconciler = Reconciler::new(
            &source,
            temp_dir.path().join("replica"),
            MirrorOptions::default(),
            log,
        );

        let result = reconciler.run_pass().await;
        assert!(matches!(result, Err(MirrorError::DirectoryScan { .. })));
    }

    #[tokio::test]
    async fn test_replica_root_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        assert_eq!(reconciler.source_root(), source);
        assert_eq!(reconciler.replica_root(), replica);

        fs::write(source.join("file1.txt"), b"content1").await.unwrap();

        assert!(!replica.exists());
        reconciler.run_pass().await.unwrap();
        assert!(replica.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_entry_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("good.txt"), b"good").await.unwrap();
        // A dangling source link fails the copy, not the pass
        fs::symlink("missing-target", source.join("broken"))
            .await
            .unwrap();

        let summary = reconciler.run_pass().await.unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.files_copied, 1);
        assert!(replica.join("good.txt").exists());
        assert!(!replica.join("broken").exists());
    }

    #[tokio::test]
    async fn test_bytes_copied_accumulates() {
        let temp_dir = TempDir::new().unwrap();
        let (reconciler, source, _replica) = new_reconciler(&temp_dir).await;

        fs::write(source.join("a.bin"), vec![1u8; 100]).await.unwrap();
        fs::write(source.join("b.bin"), vec![2u8; 50]).await.unwrap();

        let summary = reconciler.run_pass().await.unwrap();
        assert_eq!(summary.bytes_copied, 150);
    }
}
