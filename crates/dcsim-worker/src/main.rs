//! dcsim worker
//!
//! Claims queued experiments from the shared store and simulates them.

mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dcsim_core::WorkerConfig;
use dcsim_store::{schema, ExperimentQueue, SqliteGateway};
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::worker::Worker;

/// dcsim worker - simulates queued datacenter scheduling experiments
#[derive(Parser, Debug)]
#[command(name = "dcsim-worker")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Connection URL of the experiment store
    #[arg(long)]
    database_url: Option<String>,

    /// Sleep between polls of an empty backlog, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Exit once the backlog is empty
    #[arg(long)]
    drain: bool,

    /// Stop after this many experiments (0 = unlimited)
    #[arg(long)]
    max_experiments: Option<u64>,

    /// Create the store tables before polling
    #[arg(long)]
    init_schema: bool,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(WorkerConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => WorkerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => WorkerConfig::default(),
        };

        if let Some(url) = self.database_url {
            config.database.url = url;
        }
        if let Some(interval) = self.poll_interval_ms {
            config.worker.poll_interval_ms = interval;
        }
        if self.drain {
            config.worker.drain = true;
        }
        if let Some(max) = self.max_experiments {
            config.worker.max_experiments = max;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        Ok((config, self.init_schema))
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting log subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, init_schema) = Args::parse().into_config()?;
    init_logging(&config.logging.level)?;

    info!("Starting dcsim worker v{}", env!("CARGO_PKG_VERSION"));

    let gateway = SqliteGateway::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to experiment store")?;

    if init_schema {
        schema::initialize(&gateway)
            .await
            .context("initializing experiment store schema")?;
    }

    let queue = ExperimentQueue::new(Arc::new(gateway));
    let worker = Worker::new(queue, config.worker);
    let worker_id = worker.worker_id();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, finishing current experiment");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for interrupt");
                shutdown_tx.closed().await;
            }
        }
    });

    let report = worker
        .run(shutdown_rx)
        .await
        .context("worker stopped on a store error")?;

    info!(
        worker_id = %worker_id,
        finished = report.finished,
        failed = report.failed,
        "dcsim worker exiting"
    );
    Ok(())
}
