//! Protocol events reported to the observability surface.
//!
//! Faults never abort a round; they are emitted here and the round carries
//! on for every unaffected owner.

use serde::{Deserialize, Serialize};

use crate::{RoundNumber, WitnessId};

/// Why a reconstruction was not accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultReason {
    /// The recombined secret does not hash to the owner's commitment.
    CommitmentMismatch,
    /// The shares could not be recombined at all.
    RecombinationFailed(String),
    /// The owner published two different commitments in one round.
    CommitmentConflict,
}

impl std::fmt::Display for FaultReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultReason::CommitmentMismatch => write!(f, "commitment mismatch"),
            FaultReason::RecombinationFailed(e) => write!(f, "recombination failed: {e}"),
            FaultReason::CommitmentConflict => write!(f, "conflicting commitments"),
        }
    }
}

/// Everything the protocol reports while running rounds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtocolEvent {
    RoundStarted {
        round: RoundNumber,
        witnesses: usize,
    },
    BlockPublished {
        round: RoundNumber,
        turn: u32,
        producer: WitnessId,
        sealed: usize,
        opened: usize,
    },
    SecretRecovered {
        round: RoundNumber,
        observer: WitnessId,
        owner: WitnessId,
    },
    IntegrityFault {
        round: RoundNumber,
        observer: WitnessId,
        owner: WitnessId,
        reason: FaultReason,
    },
    DuplicateShare {
        round: RoundNumber,
        observer: WitnessId,
        owner: WitnessId,
        sender: WitnessId,
    },
    MissingProducer {
        round: RoundNumber,
        turn: u32,
        producer: WitnessId,
        reason: String,
    },
    InsufficientShares {
        round: RoundNumber,
        observer: WitnessId,
        owner: WitnessId,
        collected: usize,
        threshold: usize,
    },
    RecordRejected {
        round: RoundNumber,
        observer: WitnessId,
        producer: WitnessId,
        reason: String,
    },
    RoundCompleted {
        round: RoundNumber,
        produced: usize,
        missing: usize,
        randomness_agreed: bool,
    },
}

impl ProtocolEvent {
    /// Round the event belongs to.
    pub fn round(&self) -> RoundNumber {
        match self {
            ProtocolEvent::RoundStarted { round, .. }
            | ProtocolEvent::BlockPublished { round, .. }
            | ProtocolEvent::SecretRecovered { round, .. }
            | ProtocolEvent::IntegrityFault { round, .. }
            | ProtocolEvent::DuplicateShare { round, .. }
            | ProtocolEvent::MissingProducer { round, .. }
            | ProtocolEvent::InsufficientShares { round, .. }
            | ProtocolEvent::RecordRejected { round, .. }
            | ProtocolEvent::RoundCompleted { round, .. } => *round,
        }
    }

    /// Faults that must be surfaced, as opposed to expected outcomes.
    ///
    /// Duplicate shares are not faults: re-broadcast shares reach witnesses
    /// that already hold them in every honest round.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ProtocolEvent::IntegrityFault { .. } | ProtocolEvent::RecordRejected { .. }
        )
    }

    /// Short name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolEvent::RoundStarted { .. } => "round_started",
            ProtocolEvent::BlockPublished { .. } => "block_published",
            ProtocolEvent::SecretRecovered { .. } => "secret_recovered",
            ProtocolEvent::IntegrityFault { .. } => "integrity_fault",
            ProtocolEvent::DuplicateShare { .. } => "duplicate_share",
            ProtocolEvent::MissingProducer { .. } => "missing_producer",
            ProtocolEvent::InsufficientShares { .. } => "insufficient_shares",
            ProtocolEvent::RecordRejected { .. } => "record_rejected",
            ProtocolEvent::RoundCompleted { .. } => "round_completed",
        }
    }
}
