//! # beacon-types
//!
//! Shared domain types for the witness randomness beacon: witness ids,
//! commitments, share envelopes, block records and protocol events.

pub mod block;
pub mod envelope;
pub mod events;

use serde::{Deserialize, Serialize};

/// A 32-byte digest.
pub type Hash = [u8; 32];

/// Monotonic round counter. Round 0 is never run; the first round is 1.
pub type RoundNumber = u64;

/// Digest that the first block record of the ledger links to.
pub const GENESIS_DIGEST: Hash = [0u8; 32];

/// Stable identity of a witness, unique across the witness set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WitnessId(pub u32);

impl std::fmt::Display for WitnessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "w{}", self.0)
    }
}

impl WitnessId {
    /// Little-endian bytes, used when hashing ids into digests.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

/// Hash commitment to a witness's round secret.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub Hash);

impl Commitment {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl std::fmt::Debug for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..8]))
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
