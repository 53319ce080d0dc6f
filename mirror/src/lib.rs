//! Mirroring Engine Library
//!
//! An async one-way folder mirroring library providing:
//! - Content-based change detection (SHA-256 or Blake3, never timestamps)
//! - Recursive replica reconciliation with per-entry error recovery
//! - An append-only audit log of every replica change
//! - Single-flight pass coordination that drops triggers while busy

pub mod hasher;
pub mod event_log;
pub mod reconciler;
pub mod coordinator;
pub mod error;

// Re-export main types and functions
pub use hasher::{FileHasher, HashAlgorithm};
pub use event_log::EventLog;
pub use reconciler::{MirrorAction, MirrorOptions, PassSummary, Reconciler};
pub use coordinator::{Coordinator, MirrorRequest, TriggerSource};
pub use error::{MirrorError, Result};

/// Run a single mirroring pass from `source` into `replica`
pub async fn mirror_pass(
    source: impl AsRef<std::path::Path>,
    replica: impl AsRef<std::path::Path>,
    options: MirrorOptions,
    log: EventLog,
) -> Result<PassSummary> {
    let reconciler = Reconciler::new(source.as_ref(), replica.as_ref(), options, log);
    reconciler.run_pass().await
}
