//! Round driver.
//!
//! Runs rounds on a fixed interval until the configured count is reached or
//! the cancellation flag is set. A cancelled round is abandoned at the next
//! turn boundary and never reported.

use std::time::Duration;

use beacon_protocol::scheduler::{RoundReport, RoundScheduler};
use beacon_protocol::ProtocolError;
use beacon_types::WitnessId;
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::events::EventBus;

/// Totals over every completed round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds: u64,
    pub agreed: u64,
    pub blocks: u64,
    pub missing: u64,
    pub faults: u64,
    pub duplicates: u64,
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, report: &RoundReport) {
        self.rounds += 1;
        self.blocks += report.produced as u64;
        self.missing += report.missing.len() as u64;
        self.faults += report.faults().count() as u64;
        self.duplicates += report.duplicates() as u64;
        if report.randomness_agreed() {
            self.agreed += 1;
        }
    }
}

/// Mark the configured witnesses offline.
pub fn apply_offline(
    scheduler: &mut RoundScheduler,
    sim: &SimulationConfig,
) -> Result<(), ProtocolError> {
    for id in &sim.offline {
        scheduler.set_online(WitnessId(*id), false)?;
        warn!(witness = %WitnessId(*id), "witness configured offline");
    }
    Ok(())
}

/// Run rounds until done or cancelled, publishing every report on `bus`.
///
/// # Errors
///
/// Any protocol error other than cancellation stops the run.
pub async fn run(
    scheduler: &mut RoundScheduler,
    sim: &SimulationConfig,
    bus: &EventBus,
) -> Result<RunSummary, ProtocolError> {
    let cancel = scheduler.cancellation();
    let mut interval = tokio::time::interval(Duration::from_millis(sim.round_interval_ms.max(1)));
    let mut summary = RunSummary::default();

    while sim.rounds == 0 || summary.rounds < sim.rounds {
        interval.tick().await;
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        match scheduler.run_round() {
            Ok(report) => {
                info!(
                    round = report.round,
                    progress = format!("{}/{}", summary.rounds + 1, sim.rounds),
                    randomness = %report.randomness().map(hex::encode).unwrap_or_else(|| "none".to_string()),
                    "round finished"
                );
                bus.publish_report(&report);
                summary.record(&report);
            }
            Err(ProtocolError::Cancelled { round, turn }) => {
                info!(round, turn, "round abandoned");
                summary.cancelled = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_protocol::config::ProtocolConfig;

    fn sim(rounds: u64) -> SimulationConfig {
        SimulationConfig {
            witnesses: 4,
            rounds,
            round_interval_ms: 1,
            offline: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_runs_configured_rounds() {
        let mut scheduler =
            RoundScheduler::with_witnesses(ProtocolConfig::with_threshold(2), 4).expect("scheduler");
        let bus = EventBus::new(1024);
        let summary = run(&mut scheduler, &sim(3), &bus).await.expect("run");

        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.blocks, 12);
        assert_eq!(summary.agreed, 3);
        assert_eq!(summary.faults, 0);
        assert!(!summary.cancelled);
        assert_eq!(scheduler.ledger().len(), 12);
    }

    #[tokio::test]
    async fn test_offline_witness_counted_missing() {
        let mut scheduler =
            RoundScheduler::with_witnesses(ProtocolConfig::with_threshold(2), 4).expect("scheduler");
        let config = SimulationConfig {
            offline: vec![3],
            ..sim(2)
        };
        apply_offline(&mut scheduler, &config).expect("offline");

        let bus = EventBus::new(1024);
        let summary = run(&mut scheduler, &config, &bus).await.expect("run");
        assert_eq!(summary.blocks, 6);
        assert_eq!(summary.missing, 2);
    }

    #[tokio::test]
    async fn test_forwarding_counts_duplicates_not_faults() {
        let config = ProtocolConfig {
            forward_opened: true,
            ..ProtocolConfig::with_threshold(2)
        };
        let mut scheduler = RoundScheduler::with_witnesses(config, 4).expect("scheduler");
        let bus = EventBus::new(4096);
        let summary = run(&mut scheduler, &sim(2), &bus).await.expect("run");

        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.faults, 0);
        assert!(summary.duplicates > 0);
        assert_eq!(summary.agreed, 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_round() {
        let mut scheduler =
            RoundScheduler::with_witnesses(ProtocolConfig::with_threshold(2), 3).expect("scheduler");
        scheduler.cancellation().cancel();

        let bus = EventBus::new(16);
        let summary = run(&mut scheduler, &sim(0), &bus).await.expect("run");
        assert!(summary.cancelled);
        assert_eq!(summary.rounds, 0);
        assert_eq!(bus.sequence(), 0);
    }
}
