use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use mirror::HashAlgorithm;

/// Runtime settings assembled from the command line
#[derive(Debug, Clone)]
pub struct Config {
    /// Folder to mirror from
    pub source: PathBuf,
    /// Folder to mirror into
    pub replica: PathBuf,
    /// Time between periodic mirroring passes
    pub interval: Duration,
    /// File receiving the audit log
    pub log_file: PathBuf,
    /// Digest used for change detection
    pub hash_algorithm: HashAlgorithm,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !self.source.exists() {
            anyhow::bail!("Source folder does not exist: {}", self.source.display());
        }
        if !self.source.is_dir() {
            anyhow::bail!(
                "Source path is not a directory: {}",
                self.source.display()
            );
        }

        // A replica overlapping the source would mirror into itself
        let source = self.source.canonicalize()?;
        if let Some(replica) = self.resolved_replica() {
            if replica == source {
                anyhow::bail!("Replica folder must not be the source folder");
            }
            if replica.starts_with(&source) {
                anyhow::bail!("Replica folder must not live inside the source folder");
            }
            if source.starts_with(&replica) {
                anyhow::bail!("Source folder must not live inside the replica folder");
            }
        }

        Ok(())
    }

    /// Canonical replica path, resolved through its parent when the replica
    /// itself does not exist yet
    fn resolved_replica(&self) -> Option<PathBuf> {
        if let Ok(path) = self.replica.canonicalize() {
            return Some(path);
        }

        let parent = self.replica.parent()?;
        let name = self.replica.file_name()?;
        parent.canonicalize().ok().map(|parent| parent.join(name))
    }
}
