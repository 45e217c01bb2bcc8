//! beacon-daemon: runs the witness randomness beacon.
//!
//! Single OS process running a Tokio async runtime. Builds the witness set
//! from the config, runs rounds on an interval and publishes every protocol
//! event on the event bus. Ctrl-C cancels the round in flight at its next
//! turn boundary.

mod config;
mod driver;
mod events;

use beacon_protocol::scheduler::RoundScheduler;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::BeaconConfig;
use crate::events::{Event, EventBus, EventFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = BeaconConfig::load()?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("beacon={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!(
        config = %BeaconConfig::config_path().display(),
        witnesses = config.simulation.witnesses,
        threshold = config.protocol.threshold,
        "beacon daemon starting"
    );

    // 3. Build the witness set
    let mut scheduler =
        RoundScheduler::with_witnesses(config.protocol.clone(), config.simulation.witnesses)?;
    driver::apply_offline(&mut scheduler, &config.simulation)?;

    // 4. Create event bus and optional JSON printer
    let event_bus = EventBus::new(1000);
    let printer = config.advanced.json_events.then(|| {
        let filter = EventFilter::with_categories(&config.advanced.event_categories);
        tokio::spawn(print_events(event_bus.subscribe(), filter))
    });

    event_bus.emit(Event::new(
        "DaemonStarted",
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "witnesses": config.simulation.witnesses,
            "threshold": config.protocol.threshold,
        }),
    ));

    // 5. Ctrl-C cancels at the next turn boundary
    let cancel = scheduler.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, cancelling");
            cancel.cancel();
        }
    });

    // 6. Run rounds
    let result = driver::run(&mut scheduler, &config.simulation, &event_bus).await;
    match &result {
        Ok(summary) => {
            info!(
                rounds = summary.rounds,
                agreed = summary.agreed,
                blocks = summary.blocks,
                missing = summary.missing,
                faults = summary.faults,
                duplicates = summary.duplicates,
                cancelled = summary.cancelled,
                "run finished"
            );
            event_bus.emit(Event::new(
                "DaemonStopped",
                serde_json::json!({
                    "rounds": summary.rounds,
                    "agreed": summary.agreed,
                    "faults": summary.faults,
                    "duplicates": summary.duplicates,
                    "cancelled": summary.cancelled,
                }),
            ));
        }
        Err(e) => error!("round driver error: {}", e),
    }

    if let Err(e) = scheduler.ledger().verify(scheduler.directory()) {
        warn!("ledger verification failed: {}", e);
    }

    // Closing the bus lets the printer drain and exit.
    let emitted = event_bus.sequence();
    drop(event_bus);
    if let Some(handle) = printer {
        if let Err(e) = handle.await {
            error!("event printer failed: {}", e);
        }
    }

    info!(events = emitted, "Daemon stopped");
    result?;
    Ok(())
}

/// Print matching events as JSON lines until the bus closes.
async fn print_events(mut rx: broadcast::Receiver<Event>, filter: EventFilter) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if !filter.matches(&event) {
                    continue;
                }
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("failed to encode event: {}", e),
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
