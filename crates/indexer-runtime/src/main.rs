//! # Option-Vault Indexer Runtime
//!
//! Runs the event-application core as a process.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, `OVI_CONFIG` file, `OVI_*` overrides)
//! 2. Initialise logging
//! 3. Build bus, store and decoder; load fixtures if configured
//! 4. Spawn the dispatcher loop
//! 5. Feed notifications from stdin
//!
//! The process stops on Ctrl-C, or once stdin is exhausted and the
//! dispatcher has drained everything already published.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use indexer_runtime::{feed_notifications, Fixtures, RuntimeConfig};
use shared_bus::InMemoryNotificationBus;
use vault_event_processor::{
    BlockEventDispatcher, BlockEventProcessorApi, BusNotificationSource, DispatcherError,
    InMemoryStore, JsonEventDecoder,
};

fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .with_context(|| format!("Invalid log filter {filter:?}"))?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    init_logging(&config.log_filter)?;
    config.validate().context("Invalid configuration")?;

    info!("===========================================");
    info!("  Option-Vault Indexer Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let store = Arc::new(InMemoryStore::new());
    if let Some(path) = &config.fixtures {
        let fixtures = Fixtures::load(path).context("Failed to load fixtures")?;
        info!(
            vaults = fixtures.vaults.len(),
            events = fixtures.events.len(),
            path = %path.display(),
            "Fixtures loaded"
        );
        fixtures.install(&store);
    }

    let bus = Arc::new(InMemoryNotificationBus::with_capacity(config.bus_capacity));
    let dispatcher = Arc::new(BlockEventDispatcher::new(
        config.dispatcher.clone(),
        Arc::clone(&store),
        Arc::new(JsonEventDecoder::new()),
    ));

    // Subscribe before anything is published
    let mut source = BusNotificationSource::new(&bus);
    let mut dispatcher_task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.run(&mut source).await })
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let feeder_task = tokio::spawn(async move {
        let result =
            feed_notifications(BufReader::new(tokio::io::stdin()), &*bus, shutdown_rx).await;
        // Last bus handle: dropping it closes the dispatcher's source once drained
        drop(bus);
        result
    });

    info!("Indexer is running. Reading notifications from stdin, Ctrl+C to stop.");

    let outcome = tokio::select! {
        joined = &mut dispatcher_task => Some(joined),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            None
        }
    };

    if shutdown_tx.send(true).is_err() {
        warn!("Feeder already stopped");
    }
    match feeder_task.await {
        Ok(Ok(summary)) => info!(
            published = summary.published,
            skipped = summary.skipped,
            "Feeder finished"
        ),
        Ok(Err(e)) => error!(error = %e, "Reading stdin failed"),
        Err(e) => error!(error = %e, "Feeder task failed"),
    }

    let stats = dispatcher.stats();
    info!(
        batches_applied = stats.batches_applied,
        batches_reverted = stats.batches_reverted,
        batches_failed = stats.batches_failed,
        events_applied = stats.events_applied,
        events_reverted = stats.events_reverted,
        payloads_rejected = stats.payloads_rejected,
        "Dispatcher statistics"
    );

    match outcome {
        None => {
            dispatcher_task.abort();
            info!("Shutdown complete");
            Ok(())
        }
        Some(Ok(Err(DispatcherError::SourceClosed))) => {
            info!("Notification source drained, shutdown complete");
            Ok(())
        }
        Some(Ok(Err(e))) => Err(e).context("Dispatcher stopped"),
        Some(Ok(Ok(()))) => Ok(()),
        Some(Err(e)) => Err(e).context("Dispatcher task failed"),
    }
}
