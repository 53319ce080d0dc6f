use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use mirror::{MirrorRequest, TriggerSource};

/// Request a mirror pass every `every` interval
///
/// The first request goes out one full interval after startup; the startup
/// pass itself is requested separately. The task ends when the receiving
/// side of the channel is dropped.
pub fn spawn_interval(every: Duration, mirror_tx: mpsc::Sender<MirrorRequest>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Scheduler started, interval {:?}", every);
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await; // Skip the first immediate tick

        loop {
            ticker.tick().await;
            let request = MirrorRequest::new(TriggerSource::Timer);
            if mirror_tx.send(request).await.is_err() {
                debug!("Mirror request channel closed, stopping scheduler");
                break;
            }
        }
    })
}
