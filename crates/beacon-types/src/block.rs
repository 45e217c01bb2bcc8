//! Block records.
//!
//! A block record is the single publication a witness makes on its turn:
//! its commitment for the round, the shares it sealed to every other
//! witness, and the opened shares it is re-broadcasting. Records are never
//! mutated after the producer signs them.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::envelope::{OpenedShare, SealedShare, ShareEnvelope};
use crate::{Commitment, Hash, RoundNumber, WitnessId};

/// An immutable per-turn publication.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub round: RoundNumber,
    /// Turn index within the round, in scheduler order.
    pub turn: u32,
    pub producer: WitnessId,
    /// Digest of the record this one extends.
    pub previous: Hash,
    pub commitment: Commitment,
    pub sealed: Vec<SealedShare>,
    pub opened: Vec<OpenedShare>,
    /// Producer's Ed25519 signature over the record digest.
    #[serde_as(as = "serde_with::Bytes")]
    pub signature: [u8; 64],
}

impl BlockRecord {
    /// `(round, turn)` position used to order records in the ledger.
    pub fn position(&self) -> (RoundNumber, u32) {
        (self.round, self.turn)
    }

    /// Sealed shares addressed to `recipient`.
    pub fn sealed_for(&self, recipient: WitnessId) -> impl Iterator<Item = &SealedShare> {
        self.sealed.iter().filter(move |s| s.recipient == recipient)
    }

    /// Every envelope carried by the record, sealed first.
    pub fn envelopes(&self) -> impl Iterator<Item = ShareEnvelope> + '_ {
        self.sealed
            .iter()
            .cloned()
            .map(ShareEnvelope::Sealed)
            .chain(self.opened.iter().cloned().map(ShareEnvelope::Opened))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BlockRecord {
        BlockRecord {
            round: 2,
            turn: 1,
            producer: WitnessId(1),
            previous: [7u8; 32],
            commitment: Commitment([9u8; 32]),
            sealed: (0..4u32)
                .filter(|r| *r != 1)
                .map(|r| SealedShare {
                    round: 2,
                    sender: WitnessId(1),
                    recipient: WitnessId(r),
                    ciphertext: vec![r as u8; 4],
                })
                .collect(),
            opened: vec![OpenedShare {
                round: 2,
                owner: WitnessId(0),
                sender: WitnessId(1),
                share: vec![2, 2, 5],
            }],
            signature: [1u8; 64],
        }
    }

    #[test]
    fn test_sealed_for_filters_recipient() {
        let r = record();
        let for_two: Vec<_> = r.sealed_for(WitnessId(2)).collect();
        assert_eq!(for_two.len(), 1);
        assert_eq!(for_two[0].ciphertext, vec![2u8; 4]);
        assert_eq!(r.sealed_for(WitnessId(1)).count(), 0);
    }

    #[test]
    fn test_envelopes_cover_everything() {
        let r = record();
        assert_eq!(r.envelopes().count(), 4);
        assert_eq!(r.position(), (2, 1));
    }

    #[test]
    fn test_json_roundtrip_keeps_signature() {
        let r = record();
        let json = serde_json::to_string(&r).expect("serialize");
        let back: BlockRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, r);
    }
}
