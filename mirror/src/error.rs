//! Error types for the mirroring engine library

use std::path::PathBuf;

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Comprehensive error type for mirror operations
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory scanning errors
    #[error("Directory scan error at '{path}': {message}")]
    DirectoryScan { path: PathBuf, message: String },

    /// Hash computation errors
    #[error("Hash computation error for '{path}': {message}")]
    Hash { path: PathBuf, message: String },

    /// File copying errors
    #[error("File copy error: {message}")]
    FileCopy {
        message: String,
    },

    /// File and directory deletion errors
    #[error("Deletion error at '{path}': {message}")]
    Deletion { path: PathBuf, message: String },

    /// Directory creation errors
    #[error("Directory creation error at '{path}': {message}")]
    DirectoryCreation { path: PathBuf, message: String },

    /// Audit log errors
    #[error("Audit log error at '{path}': {message}")]
    AuditLog { path: PathBuf, message: String },
}

impl MirrorError {
    /// Create a new directory scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryScan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new hash error
    pub fn hash_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new file copy error
    pub fn copy_error(
        source: impl AsRef<std::path::Path>,
        replica: impl AsRef<std::path::Path>,
        message: impl Into<String>,
    ) -> Self {
        let full_message = format!(
            "from '{}' to '{}': {}",
            source.as_ref().display(),
            replica.as_ref().display(),
            message.into()
        );
        Self::FileCopy {
            message: full_message,
        }
    }

    /// Create a new deletion error
    pub fn deletion_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Deletion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new directory creation error
    pub fn creation_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DirectoryCreation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new audit log error
    pub fn log_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::AuditLog {
            path: path.into(),
            message: message.into(),
        }
    }
}
