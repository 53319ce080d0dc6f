use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use mirror::{EventLog, MirrorRequest, TriggerSource};

/// Recursive watch on the source tree
///
/// Raw notifications are recorded in the audit log and folded into
/// `FileChange` mirror requests. The notify watcher stops when this struct
/// is dropped.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Start watching `source` recursively
    pub fn spawn(
        source: &Path,
        log: EventLog,
        mirror_tx: mpsc::Sender<MirrorRequest>,
    ) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel::<Event>(1000);

        // The notify callback runs on the watcher's own thread, so events
        // are handed to the async side through a bounded channel
        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let Err(e) = event_tx.try_send(event) {
                        warn!("Failed to queue watcher event: {}", e);
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            })?;

        watcher.watch(source, RecursiveMode::Recursive)?;

        tokio::spawn(Self::forward_events(event_rx, log, mirror_tx));

        Ok(Self { _watcher: watcher })
    }

    /// Record each raw event in the audit log, then request a pass
    async fn forward_events(
        mut events: mpsc::Receiver<Event>,
        log: EventLog,
        mirror_tx: mpsc::Sender<MirrorRequest>,
    ) {
        while let Some(event) = events.recv().await {
            let action = match describe(&event.kind) {
                Some(action) => action,
                None => {
                    debug!("Ignoring watcher event: {:?}", event.kind);
                    continue;
                }
            };

            if let Some(detail) = describe_paths(&event) {
                if let Err(e) = log.record(action, detail).await {
                    warn!("Failed to record watcher event: {}", e);
                }
            }

            let request = MirrorRequest::new(TriggerSource::FileChange);
            if mirror_tx.send(request).await.is_err() {
                debug!("Mirror request channel closed, stopping event forwarding");
                break;
            }
        }
    }
}

/// Audit log action for a raw notification, if it is worth recording
fn describe(kind: &EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Create(_) => Some("Created"),
        EventKind::Modify(ModifyKind::Name(_)) => Some("Renamed"),
        EventKind::Modify(_) => Some("Changed"),
        EventKind::Remove(_) => Some("Deleted"),
        EventKind::Access(_) => None,
        _ => None,
    }
}

/// Render the paths attached to an event, `old -> new` for renames
fn describe_paths(event: &Event) -> Option<String> {
    match event.paths.as_slice() {
        [] => None,
        [path] => Some(path.display().to_string()),
        [from, to, ..] => Some(format!("{} -> {}", from.display(), to.display())),
    }
}
