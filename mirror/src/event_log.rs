//! Append-only audit log for replica changes and watcher events

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{MirrorError, Result};

/// Shared handle to the audit log file
///
/// Every recorded event is appended to the log file and echoed to stdout as
/// a single `YYYY-MM-DD HH:MM:SS action detail` line. Clones share the same
/// underlying file handle, so concurrent writers never interleave within a
/// line.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

struct EventLogInner {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLog {
    /// Open the audit log file in append mode, creating it if needed
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    MirrorError::log_error(
                        &path,
                        format!("Failed to create log directory: {}", e),
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                MirrorError::log_error(&path, format!("Failed to open log file: {}", e))
            })?;

        Ok(Self {
            inner: Arc::new(EventLogInner {
                path,
                file: Mutex::new(file),
            }),
        })
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Append one event line and echo it to stdout
    pub async fn record(&self, action: &str, detail: impl Display) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut line = format!("{} {} {}", timestamp, action, detail);

        println!("{}", line);
        line.push('\n');

        let mut file = self.inner.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        file.flush().await.map_err(|e| self.write_error(e))?;

        Ok(())
    }

    fn write_error(&self, e: std::io::Error) -> MirrorError {
        MirrorError::log_error(
            &self.inner.path,
            format!("Failed to append to log file: {}", e),
        )
    }
}
