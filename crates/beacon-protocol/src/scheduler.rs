//! Round-robin turns, delivery and round boundaries.
//!
//! The scheduler exclusively owns every [`Witness`] through a
//! [`WitnessRegistry`], the [`WitnessDirectory`] and the [`BlockLedger`].
//!
//! ## Round Flow
//!
//! 1. Every witness rotates to a fresh secret and clears its caches
//! 2. Witnesses take one turn each in directory order. A produced record is
//!    appended to the ledger and delivered to every other witness, then to
//!    its producer, before the next turn starts
//! 3. After the last turn each witness reports its outcome; owners that
//!    never settled are reported as insufficient
//!
//! A witness that cannot produce is skipped. A peer that rejects a record
//! is reported and the turn carries on. Cancellation is checked between
//! turns only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_crypto::suite::{CryptoSuite, StandardSuite};
use beacon_types::block::BlockRecord;
use beacon_types::events::ProtocolEvent;
use beacon_types::{Hash, RoundNumber, WitnessId};

use crate::config::ProtocolConfig;
use crate::directory::WitnessDirectory;
use crate::ledger::BlockLedger;
use crate::witness::{TurnContext, Witness, WitnessRoundOutcome};
use crate::{ProtocolError, Result};

/// Arena of witnesses addressed by stable slot.
#[derive(Debug, Default)]
pub struct WitnessRegistry {
    slots: Vec<Witness>,
    index: BTreeMap<WitnessId, usize>,
}

impl WitnessRegistry {
    /// Add a witness, returning its slot.
    pub fn insert(&mut self, witness: Witness) -> Result<usize> {
        let id = witness.id();
        if self.index.contains_key(&id) {
            return Err(ProtocolError::DuplicateWitness(id));
        }
        let slot = self.slots.len();
        self.slots.push(witness);
        self.index.insert(id, slot);
        Ok(slot)
    }

    pub fn get(&self, id: WitnessId) -> Option<&Witness> {
        self.index.get(&id).and_then(|slot| self.slots.get(*slot))
    }

    pub fn get_mut(&mut self, id: WitnessId) -> Option<&mut Witness> {
        let slot = *self.index.get(&id)?;
        self.slots.get_mut(slot)
    }

    /// Witness ids in turn order.
    pub fn ids(&self) -> Vec<WitnessId> {
        self.index.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Witness> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Witness> {
        self.slots.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Shared flag that aborts a round at the next turn boundary.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next round can run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Everything that happened in one round.
#[derive(Clone, Debug)]
pub struct RoundReport {
    pub round: RoundNumber,
    /// Records appended to the ledger this round.
    pub produced: usize,
    /// Witnesses whose turn was skipped.
    pub missing: Vec<WitnessId>,
    /// Per-witness view at round end, in turn order.
    pub outcomes: Vec<WitnessRoundOutcome>,
    /// Events in the order they were raised.
    pub events: Vec<ProtocolEvent>,
}

impl RoundReport {
    /// The beacon value, if every witness derived the same one.
    pub fn randomness(&self) -> Option<Hash> {
        let first = self.outcomes.first()?.randomness?;
        self.outcomes
            .iter()
            .all(|o| o.randomness == Some(first))
            .then_some(first)
    }

    pub fn randomness_agreed(&self) -> bool {
        self.randomness().is_some()
    }

    /// Events that must be surfaced as faults.
    pub fn faults(&self) -> impl Iterator<Item = &ProtocolEvent> {
        self.events.iter().filter(|e| e.is_fault())
    }

    /// Opened shares delivered to a witness that already held them.
    pub fn duplicates(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ProtocolEvent::DuplicateShare { .. }))
            .count()
    }

    pub fn outcome(&self, witness: WitnessId) -> Option<&WitnessRoundOutcome> {
        self.outcomes.iter().find(|o| o.witness == witness)
    }
}

/// Drives rounds over a fixed witness set.
pub struct RoundScheduler {
    config: ProtocolConfig,
    suite: Arc<dyn CryptoSuite>,
    registry: WitnessRegistry,
    directory: WitnessDirectory,
    ledger: BlockLedger,
    round: RoundNumber,
    cancel: CancellationFlag,
}

impl std::fmt::Debug for RoundScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundScheduler")
            .field("config", &self.config)
            .field("witnesses", &self.registry.len())
            .field("round", &self.round)
            .field("ledger", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

impl RoundScheduler {
    /// Create a scheduler with no witnesses.
    pub fn new(config: ProtocolConfig, suite: Arc<dyn CryptoSuite>) -> Self {
        Self {
            config,
            suite,
            registry: WitnessRegistry::default(),
            directory: WitnessDirectory::new(),
            ledger: BlockLedger::new(),
            round: 0,
            cancel: CancellationFlag::new(),
        }
    }

    /// Create a scheduler with witnesses `0..count` on the standard suite.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidConfig`] if `config` does not fit `count` witnesses
    pub fn with_witnesses(config: ProtocolConfig, count: u32) -> Result<Self> {
        config.validate(count as usize)?;
        let mut scheduler = Self::new(config, Arc::new(StandardSuite));
        for i in 0..count {
            scheduler.spawn_witness(WitnessId(i))?;
        }
        tracing::info!(
            witnesses = count,
            threshold = scheduler.config.threshold,
            "witness set created"
        );
        Ok(scheduler)
    }

    /// Create a witness with fresh keys and add it.
    pub fn spawn_witness(&mut self, id: WitnessId) -> Result<()> {
        let witness = Witness::new(id, self.config.clone(), self.suite.clone());
        self.add_witness(witness)
    }

    /// Publish a witness's keys and take ownership of it.
    pub fn add_witness(&mut self, witness: Witness) -> Result<()> {
        if self.registry.get(witness.id()).is_some() {
            return Err(ProtocolError::DuplicateWitness(witness.id()));
        }
        self.directory.register(witness.id(), witness.public_keys())?;
        self.registry.insert(witness)?;
        Ok(())
    }

    /// Mark a witness online or offline.
    pub fn set_online(&mut self, id: WitnessId, online: bool) -> Result<()> {
        self.registry
            .get_mut(id)
            .ok_or(ProtocolError::UnknownWitness(id))?
            .set_online(online);
        Ok(())
    }

    /// Run the next round with a fresh random secret for every witness.
    pub fn run_round(&mut self) -> Result<RoundReport> {
        self.run_round_with_secrets(&BTreeMap::new())
    }

    /// Run the next round, using the given secrets where provided.
    ///
    /// Witnesses not in `secrets` draw a random secret.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidConfig`] if the witness set does not fit the config or a
    ///   chosen secret is empty
    /// - [`ProtocolError::UnknownWitness`] if a chosen secret names no registered witness
    /// - [`ProtocolError::Cancelled`] if the cancellation flag was set between turns
    /// - [`ProtocolError::LedgerLink`] if a produced record does not extend the ledger
    pub fn run_round_with_secrets(
        &mut self,
        secrets: &BTreeMap<WitnessId, Vec<u8>>,
    ) -> Result<RoundReport> {
        self.config.validate(self.directory.len())?;
        for (id, secret) in secrets {
            if self.registry.get(*id).is_none() {
                return Err(ProtocolError::UnknownWitness(*id));
            }
            if secret.is_empty() {
                return Err(ProtocolError::InvalidConfig(format!(
                    "round secret for {id} must not be empty"
                )));
            }
        }

        self.round += 1;
        let round = self.round;
        for witness in self.registry.iter_mut() {
            match secrets.get(&witness.id()) {
                Some(secret) => witness.begin_round_with_secret(round, secret.clone())?,
                None => witness.begin_round(round)?,
            }
        }

        let mut events = vec![ProtocolEvent::RoundStarted {
            round,
            witnesses: self.registry.len(),
        }];
        let mut produced = 0;
        let mut missing = Vec::new();

        tracing::info!(round, witnesses = self.registry.len(), "round started");

        for (turn, producer) in self.registry.ids().into_iter().enumerate() {
            let turn = turn as u32;
            if self.cancel.is_cancelled() {
                tracing::warn!(round, turn, "round cancelled");
                return Err(ProtocolError::Cancelled { round, turn });
            }

            let ctx = TurnContext {
                round,
                turn,
                previous: self.ledger.tip(),
            };
            let witness = self
                .registry
                .get_mut(producer)
                .ok_or(ProtocolError::UnknownWitness(producer))?;

            let record = match witness.produce_block(&ctx, &self.directory) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(round, turn, producer = %producer, error = %e, "producer skipped");
                    events.push(ProtocolEvent::MissingProducer {
                        round,
                        turn,
                        producer,
                        reason: e.to_string(),
                    });
                    missing.push(producer);
                    continue;
                }
            };

            self.ledger.append(record.clone())?;
            produced += 1;
            events.push(ProtocolEvent::BlockPublished {
                round,
                turn,
                producer,
                sealed: record.sealed.len(),
                opened: record.opened.len(),
            });

            deliver(&mut self.registry, &self.directory, &record, &mut events);
        }

        let outcomes: Vec<WitnessRoundOutcome> = self
            .registry
            .ids()
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .map(|w| w.round_outcome(&self.directory))
            .collect();

        for outcome in &outcomes {
            for (owner, collected) in &outcome.insufficient {
                events.push(ProtocolEvent::InsufficientShares {
                    round,
                    observer: outcome.witness,
                    owner: *owner,
                    collected: *collected,
                    threshold: self.config.threshold,
                });
            }
        }

        let mut report = RoundReport {
            round,
            produced,
            missing,
            outcomes,
            events,
        };
        let randomness_agreed = report.randomness_agreed();
        report.events.push(ProtocolEvent::RoundCompleted {
            round,
            produced,
            missing: report.missing.len(),
            randomness_agreed,
        });

        tracing::info!(
            round,
            produced,
            missing = report.missing.len(),
            faults = report.faults().count(),
            duplicates = report.duplicates(),
            randomness_agreed,
            randomness = %report.randomness().map(hex::encode).unwrap_or_default(),
            "round completed"
        );

        Ok(report)
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Last round started.
    pub fn round(&self) -> RoundNumber {
        self.round
    }

    pub fn witness(&self, id: WitnessId) -> Option<&Witness> {
        self.registry.get(id)
    }

    pub fn witness_mut(&mut self, id: WitnessId) -> Option<&mut Witness> {
        self.registry.get_mut(id)
    }

    pub fn directory(&self) -> &WitnessDirectory {
        &self.directory
    }

    pub fn ledger(&self) -> &BlockLedger {
        &self.ledger
    }

    /// Handle for cancelling rounds from another task.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }
}

/// Deliver a record to every peer, then to its producer.
fn deliver(
    registry: &mut WitnessRegistry,
    directory: &WitnessDirectory,
    record: &BlockRecord,
    events: &mut Vec<ProtocolEvent>,
) {
    for witness in registry.iter_mut().filter(|w| w.id() != record.producer) {
        apply(witness, directory, record, events);
    }
    if let Some(witness) = registry.get_mut(record.producer) {
        apply(witness, directory, record, events);
    }
}

fn apply(
    witness: &mut Witness,
    directory: &WitnessDirectory,
    record: &BlockRecord,
    events: &mut Vec<ProtocolEvent>,
) {
    match witness.process_block(record, directory) {
        Ok(receipt) => events.extend(receipt.events),
        Err(e) => {
            tracing::warn!(
                observer = %witness.id(),
                producer = %record.producer,
                round = record.round,
                turn = record.turn,
                error = %e,
                "record rejected"
            );
            events.push(ProtocolEvent::RecordRejected {
                round: record.round,
                observer: witness.id(),
                producer: record.producer,
                reason: e.to_string(),
            });
        }
    }
}
