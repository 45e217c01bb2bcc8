//! # beacon-protocol
//!
//! Round-based commit-and-reveal randomness run by a fixed witness set.
//!
//! Every round each witness commits to a fresh secret, splits it into
//! threshold shares and seals one share to every other witness inside its
//! block record. Witnesses reveal the shares they decrypted in their own
//! records, and anyone who collects `threshold` opened shares for an owner
//! reconstructs that owner's secret and checks it against the commitment.
//!
//! ## Modules
//!
//! - [`config`]: Protocol parameters and validation.
//! - [`directory`]: Witness id to public key mapping.
//! - [`recoverer`]: Per-owner share accumulation and reconstruction.
//! - [`witness`]: Witness state: keys, round secret, block production and processing.
//! - [`signing`]: Block record digests and producer signatures.
//! - [`ledger`]: Append-only ordered sequence of block records.
//! - [`scheduler`]: Round-robin turns, delivery and round boundaries.

pub mod config;
pub mod directory;
pub mod ledger;
pub mod recoverer;
pub mod scheduler;
pub mod signing;
pub mod witness;

use beacon_types::{RoundNumber, WitnessId};

/// Error types for protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The protocol parameters are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A witness id is not in the directory.
    #[error("unknown witness: {0}")]
    UnknownWitness(WitnessId),

    /// A witness id was registered twice.
    #[error("witness already registered: {0}")]
    DuplicateWitness(WitnessId),

    /// A record or envelope belongs to another round.
    #[error("round mismatch: expected {expected}, got {actual}")]
    RoundMismatch {
        /// Round the witness is in.
        expected: RoundNumber,
        /// Round carried by the input.
        actual: RoundNumber,
    },

    /// The producer signature over a block record does not verify.
    #[error("invalid signature on block from {0}")]
    InvalidSignature(WitnessId),

    /// A sealed share in a record does not belong to its producer.
    #[error("misattributed share in block from {producer}: sender {sender}")]
    MisattributedShare {
        /// Producer of the record.
        producer: WitnessId,
        /// Sender claimed by the envelope.
        sender: WitnessId,
    },

    /// A record does not extend the ledger tip.
    #[error("ledger linkage error: {0}")]
    LedgerLink(String),

    /// The witness is offline and cannot produce.
    #[error("witness {0} is offline")]
    Offline(WitnessId),

    /// The round was cancelled between turns.
    #[error("round {round} cancelled before turn {turn}")]
    Cancelled {
        /// Round that was aborted.
        round: RoundNumber,
        /// First turn that did not run.
        turn: u32,
    },

    /// An underlying cryptographic capability failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] beacon_crypto::CryptoError),
}

/// Convenience result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
