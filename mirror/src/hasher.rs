//! Content fingerprinting used to decide whether two files differ

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{MirrorError, Result};

/// Hash algorithms available for content fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256 digest
    Sha256,
    /// Blake3 digest (faster)
    Blake3,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Blake3
    }
}

/// Streaming file hasher
///
/// Files are read in fixed-size chunks so arbitrarily large files can be
/// fingerprinted without loading them into memory. Digests are returned as
/// lowercase hex strings.
pub struct FileHasher {
    algorithm: HashAlgorithm,
    /// Buffer size for file reads
    buffer_size: usize,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl FileHasher {
    /// Create a new hasher for the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            buffer_size: 64 * 1024, // 64KB buffer
        }
    }

    /// Create a new hasher with a custom read buffer size
    pub fn with_buffer_size(algorithm: HashAlgorithm, buffer_size: usize) -> Self {
        Self {
            algorithm,
            buffer_size,
        }
    }

    /// Algorithm this hasher applies
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Compute the content digest of a file
    pub async fn hash_file<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();

        let mut file = fs::File::open(path)
            .await
            .map_err(|e| MirrorError::hash_error(path, format!("Failed to open file: {}", e)))?;

        let mut buffer = vec![0u8; self.buffer_size];

        match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let bytes_read = file.read(&mut buffer).await.map_err(|e| {
                        MirrorError::hash_error(path, format!("Failed to read file: {}", e))
                    })?;

                    if bytes_read == 0 {
                        break;
                    }

                    hasher.update(&buffer[..bytes_read]);
                }
                Ok(format!("{:x}", hasher.finalize()))
            }
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    let bytes_read = file.read(&mut buffer).await.map_err(|e| {
                        MirrorError::hash_error(path, format!("Failed to read file: {}", e))
                    })?;

                    if bytes_read == 0 {
                        break;
                    }

                    hasher.update(&buffer[..bytes_read]);
                }
                Ok(hasher.finalize().to_hex().to_string())
            }
        }
    }
}
