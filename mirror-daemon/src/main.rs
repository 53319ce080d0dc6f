use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod daemon;
mod scheduler;
mod watcher;

use config::Config;
use mirror::HashAlgorithm;

#[derive(Parser)]
#[command(name = "mirror-daemon")]
#[command(about = "One-way folder mirroring service")]
#[command(version = "0.1.0")]
struct Cli {
    /// Folder to mirror from
    source: PathBuf,

    /// Folder to mirror into
    replica: PathBuf,

    /// Seconds between periodic mirroring passes
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    interval_seconds: u64,

    /// File receiving the audit log
    log_file: PathBuf,

    /// Hash algorithm for change detection (blake3 or sha256)
    #[arg(long, default_value = "blake3")]
    hash: String,

    /// Log level for diagnostics
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let hash_algorithm = match cli.hash.to_lowercase().as_str() {
        "sha256" => HashAlgorithm::Sha256,
        _ => HashAlgorithm::Blake3,
    };

    let config = Config {
        source: cli.source,
        replica: cli.replica,
        interval: Duration::from_secs(cli.interval_seconds),
        log_file: cli.log_file,
        hash_algorithm,
    };

    daemon::run(config).await
}

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    // Diagnostics go to stderr so stdout stays a clean audit stream
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "mirror={},mirror_daemon={}",
                    level, level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
