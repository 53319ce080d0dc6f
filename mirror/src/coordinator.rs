//! Trigger handling and single-flight execution of mirroring passes

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::reconciler::Reconciler;

/// What caused a mirroring pass to be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Initial pass when the service starts
    Startup,
    /// Periodic interval timer
    Timer,
    /// Filesystem change notification
    FileChange,
}

/// A request for one mirroring pass
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    pub triggered_by: TriggerSource,
    pub timestamp: Instant,
}

impl MirrorRequest {
    pub fn new(triggered_by: TriggerSource) -> Self {
        Self {
            triggered_by,
            timestamp: Instant::now(),
        }
    }
}

/// Single consumer of mirror requests
///
/// At most one pass runs at a time. Requests arriving while a pass is in
/// flight are dropped rather than queued, since the running pass already
/// covers the whole tree. The permit guarding the pass is owned by the pass
/// task, so it is released however that task exits.
#[derive(Clone)]
pub struct Coordinator {
    reconciler: Arc<Reconciler>,
    guard: Arc<Semaphore>,
    passes: Arc<AtomicU64>,
}

impl Coordinator {
    /// Create a coordinator around a reconciler
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            guard: Arc::new(Semaphore::new(1)),
            passes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of passes that have completed successfully
    pub fn passes_completed(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Consume mirror requests until every sender is gone
    pub async fn run(self, mut requests: mpsc::Receiver<MirrorRequest>) {
        info!(
            "Mirror coordinator started: '{}' -> '{}'",
            self.reconciler.source_root().display(),
            self.reconciler.replica_root().display()
        );

        while let Some(request) = requests.recv().await {
            let permit = match self.guard.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(
                        "Pass already in flight, dropping {:?} trigger",
                        request.triggered_by
                    );
                    continue;
                }
            };

            let reconciler = Arc::clone(&self.reconciler);
            let passes = Arc::clone(&self.passes);

            tokio::spawn(async move {
                let _permit = permit;

                info!("Synchronizing folders ({:?} trigger)", request.triggered_by);

                match reconciler.run_pass().await {
                    Ok(summary) => {
                        passes.fetch_add(1, Ordering::Relaxed);
                        info!(
                            "Folders synchronized: {} files copied, {} files deleted, {} dirs created, {} dirs deleted, {} unchanged, {} errors",
                            summary.files_copied,
                            summary.files_deleted,
                            summary.dirs_created,
                            summary.dirs_deleted,
                            summary.files_unchanged,
                            summary.errors
                        );
                    }
                    Err(e) => {
                        error!("Error synchronizing folders: {}", e);
                    }
                }
            });
        }

        info!("Mirror coordinator stopped");
    }
}
