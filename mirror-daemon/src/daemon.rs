use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use mirror::{Coordinator, EventLog, MirrorOptions, MirrorRequest, Reconciler, TriggerSource};

use crate::config::Config;
use crate::scheduler;
use crate::watcher::SourceWatcher;

/// Run the mirroring service until Ctrl+C
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let log = EventLog::open(&config.log_file).await?;

    // The startup banner shares stdout with the audit stream
    println!("Folder mirroring service started");
    println!("Source folder: {}", config.source.display());
    println!("Replica folder: {}", config.replica.display());
    println!(
        "Synchronization interval: {} seconds",
        config.interval.as_secs()
    );
    println!("Log file: {}", config.log_file.display());

    let options = MirrorOptions {
        hash_algorithm: config.hash_algorithm,
        ..Default::default()
    };
    let reconciler = Reconciler::new(&config.source, &config.replica, options, log.clone());
    let coordinator = Coordinator::new(reconciler);

    // Setup mirror request channel
    let (mirror_tx, mirror_rx) = mpsc::channel::<MirrorRequest>(1000);

    // Queue the initial pass before any trigger source starts
    mirror_tx
        .send(MirrorRequest::new(TriggerSource::Startup))
        .await?;

    // Start trigger sources
    let _watcher = SourceWatcher::spawn(&config.source, log.clone(), mirror_tx.clone())?;
    let _scheduler = scheduler::spawn_interval(config.interval, mirror_tx);

    // Start pass processing
    tokio::spawn(coordinator.run(mirror_rx));

    info!("Mirroring service started successfully");

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");

    Ok(())
}
