//! Per-owner share accumulation and reconstruction.
//!
//! Each witness owns one [`Recoverer`]. For every owner it keeps a bucket of
//! opened shares keyed by sender, and the bucket moves through
//! [`RecoveryState`]:
//!
//! ```text
//! Collecting ──(t distinct senders + commitment known)──▶ Recovered
//!      │                                                      │
//!      └──────────(hash mismatch / recombine error)──▶ Faulted ◀─(conflicting commitment)
//! ```
//!
//! Reconstruction runs exactly once per owner per round. After it has run,
//! further shares only extend the sender set; their bytes are dropped.
//! [`Recoverer::reset`] clears everything at the round boundary.

use std::collections::{BTreeMap, BTreeSet};

use beacon_crypto::suite::CryptoSuite;
use beacon_types::events::{FaultReason, ProtocolEvent};
use beacon_types::{Commitment, RoundNumber, WitnessId};
use zeroize::Zeroizing;

/// Reconstruction state of one owner's bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveryState {
    /// Fewer than `threshold` shares, or the owner's commitment is not yet known.
    Collecting {
        shares: BTreeMap<WitnessId, Zeroizing<Vec<u8>>>,
    },
    /// The recombined secret matched the owner's commitment.
    Recovered {
        secret: Vec<u8>,
        senders: BTreeSet<WitnessId>,
    },
    /// Reconstruction was attempted and rejected, or the owner equivocated.
    Faulted {
        reason: FaultReason,
        senders: BTreeSet<WitnessId>,
    },
}

impl RecoveryState {
    fn empty() -> Self {
        RecoveryState::Collecting {
            shares: BTreeMap::new(),
        }
    }

    /// Distinct senders absorbed so far.
    pub fn contributions(&self) -> usize {
        match self {
            RecoveryState::Collecting { shares } => shares.len(),
            RecoveryState::Recovered { senders, .. } | RecoveryState::Faulted { senders, .. } => {
                senders.len()
            }
        }
    }

    /// Whether `sender` already contributed to this bucket.
    pub fn has_sender(&self, sender: WitnessId) -> bool {
        match self {
            RecoveryState::Collecting { shares } => shares.contains_key(&sender),
            RecoveryState::Recovered { senders, .. } | RecoveryState::Faulted { senders, .. } => {
                senders.contains(&sender)
            }
        }
    }

    /// Whether reconstruction has already run for this bucket.
    pub fn is_settled(&self) -> bool {
        !matches!(self, RecoveryState::Collecting { .. })
    }

    fn senders(&self) -> BTreeSet<WitnessId> {
        match self {
            RecoveryState::Collecting { shares } => shares.keys().copied().collect(),
            RecoveryState::Recovered { senders, .. } | RecoveryState::Faulted { senders, .. } => {
                senders.clone()
            }
        }
    }
}

impl std::fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryState::Collecting { shares } => write!(f, "collecting ({})", shares.len()),
            RecoveryState::Recovered { senders, .. } => {
                write!(f, "recovered ({} senders)", senders.len())
            }
            RecoveryState::Faulted { reason, .. } => write!(f, "faulted: {reason}"),
        }
    }
}

/// Result of absorbing one opened share.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Absorbed {
    /// The share was counted; `collected` distinct senders now.
    Counted { collected: usize },
    /// The sender already contributed for this owner this round.
    Duplicate,
}

/// Share buckets and known commitments for one observing witness.
#[derive(Debug)]
pub struct Recoverer {
    observer: WitnessId,
    round: RoundNumber,
    threshold: usize,
    commitments: BTreeMap<WitnessId, Commitment>,
    buckets: BTreeMap<WitnessId, RecoveryState>,
}

impl Recoverer {
    /// Create an empty recoverer for `observer`.
    pub fn new(observer: WitnessId, threshold: usize) -> Self {
        Self {
            observer,
            round: 0,
            threshold,
            commitments: BTreeMap::new(),
            buckets: BTreeMap::new(),
        }
    }

    /// Drop every bucket and commitment and move to `round`.
    pub fn reset(&mut self, round: RoundNumber) {
        let dropped = self.buckets.len();
        self.commitments.clear();
        self.buckets.clear();
        self.round = round;
        tracing::debug!(observer = %self.observer, round, dropped, "recoverer reset");
    }

    pub fn round(&self) -> RoundNumber {
        self.round
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The commitment recorded for `owner` this round.
    pub fn commitment(&self, owner: WitnessId) -> Option<&Commitment> {
        self.commitments.get(&owner)
    }

    /// Record an owner's published commitment.
    ///
    /// A repeat of the same commitment is a no-op. A different commitment
    /// from the same owner faults the owner's bucket. When the bucket was
    /// waiting on the commitment, reconstruction runs now.
    pub fn record_commitment(
        &mut self,
        suite: &dyn CryptoSuite,
        owner: WitnessId,
        commitment: Commitment,
    ) -> Vec<ProtocolEvent> {
        match self.commitments.get(&owner) {
            Some(known) if *known == commitment => Vec::new(),
            Some(_) => self.fault_conflict(owner),
            None => {
                self.commitments.insert(owner, commitment);
                self.try_recover(suite, owner).into_iter().collect()
            }
        }
    }

    /// Absorb an opened share for `owner` declared as sent by `sender`.
    ///
    /// Returns the absorb outcome and any events it caused.
    pub fn absorb(
        &mut self,
        suite: &dyn CryptoSuite,
        owner: WitnessId,
        sender: WitnessId,
        share: &[u8],
    ) -> (Absorbed, Vec<ProtocolEvent>) {
        let bucket = self.buckets.entry(owner).or_insert_with(RecoveryState::empty);

        if bucket.has_sender(sender) {
            tracing::warn!(
                observer = %self.observer,
                round = self.round,
                owner = %owner,
                sender = %sender,
                "duplicate opened share ignored"
            );
            let event = ProtocolEvent::DuplicateShare {
                round: self.round,
                observer: self.observer,
                owner,
                sender,
            };
            return (Absorbed::Duplicate, vec![event]);
        }

        let collected = match bucket {
            RecoveryState::Collecting { shares } => {
                shares.insert(sender, Zeroizing::new(share.to_vec()));
                shares.len()
            }
            RecoveryState::Recovered { senders, .. } | RecoveryState::Faulted { senders, .. } => {
                senders.insert(sender);
                senders.len()
            }
        };

        tracing::debug!(
            observer = %self.observer,
            owner = %owner,
            sender = %sender,
            progress = format!("{}/{}", collected, self.threshold),
            "opened share absorbed"
        );

        let events = self.try_recover(suite, owner).into_iter().collect();
        (Absorbed::Counted { collected }, events)
    }

    /// Current state of an owner's bucket, if any share or fault exists.
    pub fn state(&self, owner: WitnessId) -> Option<&RecoveryState> {
        self.buckets.get(&owner)
    }

    /// Distinct senders absorbed for `owner`.
    pub fn contributions(&self, owner: WitnessId) -> usize {
        self.buckets.get(&owner).map_or(0, RecoveryState::contributions)
    }

    /// Secret recovered for `owner` this round.
    pub fn recovered_secret(&self, owner: WitnessId) -> Option<&[u8]> {
        match self.buckets.get(&owner) {
            Some(RecoveryState::Recovered { secret, .. }) => Some(secret),
            _ => None,
        }
    }

    /// `(owner, secret)` for every recovered owner, in owner order.
    pub fn recovered(&self) -> impl Iterator<Item = (WitnessId, &[u8])> {
        self.buckets.iter().filter_map(|(owner, state)| match state {
            RecoveryState::Recovered { secret, .. } => Some((*owner, secret.as_slice())),
            _ => None,
        })
    }

    /// `(owner, reason)` for every faulted owner, in owner order.
    pub fn faulted(&self) -> impl Iterator<Item = (WitnessId, &FaultReason)> {
        self.buckets.iter().filter_map(|(owner, state)| match state {
            RecoveryState::Faulted { reason, .. } => Some((*owner, reason)),
            _ => None,
        })
    }

    fn fault_conflict(&mut self, owner: WitnessId) -> Vec<ProtocolEvent> {
        let bucket = self.buckets.entry(owner).or_insert_with(RecoveryState::empty);
        if matches!(
            bucket,
            RecoveryState::Faulted {
                reason: FaultReason::CommitmentConflict,
                ..
            }
        ) {
            return Vec::new();
        }
        let senders = bucket.senders();
        *bucket = RecoveryState::Faulted {
            reason: FaultReason::CommitmentConflict,
            senders,
        };

        tracing::warn!(
            observer = %self.observer,
            round = self.round,
            owner = %owner,
            "owner published conflicting commitments"
        );

        vec![ProtocolEvent::IntegrityFault {
            round: self.round,
            observer: self.observer,
            owner,
            reason: FaultReason::CommitmentConflict,
        }]
    }

    fn try_recover(&mut self, suite: &dyn CryptoSuite, owner: WitnessId) -> Option<ProtocolEvent> {
        let commitment = *self.commitments.get(&owner)?;
        let bucket = self.buckets.get_mut(&owner)?;
        let RecoveryState::Collecting { shares } = &*bucket else {
            return None;
        };
        if shares.len() < self.threshold {
            return None;
        }

        let senders: BTreeSet<WitnessId> = shares.keys().copied().collect();
        let selected: Vec<Vec<u8>> = shares
            .values()
            .take(self.threshold)
            .map(|s| s.to_vec())
            .collect();

        let outcome = suite.recombine(&selected);
        let (next, event) = match outcome {
            Ok(secret) if suite.hash(&secret) == commitment.0 => {
                tracing::info!(
                    observer = %self.observer,
                    round = self.round,
                    owner = %owner,
                    senders = senders.len(),
                    "owner secret recovered"
                );
                let event = ProtocolEvent::SecretRecovered {
                    round: self.round,
                    observer: self.observer,
                    owner,
                };
                (RecoveryState::Recovered { secret, senders }, event)
            }
            other => {
                let reason = match other {
                    Ok(_) => FaultReason::CommitmentMismatch,
                    Err(e) => FaultReason::RecombinationFailed(e.to_string()),
                };
                tracing::warn!(
                    observer = %self.observer,
                    round = self.round,
                    owner = %owner,
                    commitment = %hex::encode(commitment.as_bytes()),
                    %reason,
                    "reconstruction rejected"
                );
                let event = ProtocolEvent::IntegrityFault {
                    round: self.round,
                    observer: self.observer,
                    owner,
                    reason: reason.clone(),
                };
                (RecoveryState::Faulted { reason, senders }, event)
            }
        };

        *bucket = next;
        Some(event)
    }
}
