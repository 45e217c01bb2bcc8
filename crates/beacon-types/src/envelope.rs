//! Share transport envelopes.
//!
//! A sealed share is addressed to exactly one recipient and only that
//! recipient can decrypt it. An opened share is plaintext and, once
//! published in a block record, visible to every witness.

use serde::{Deserialize, Serialize};

use crate::{RoundNumber, WitnessId};

/// A share encrypted from its owner to a single recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedShare {
    /// Round the share belongs to.
    pub round: RoundNumber,
    /// Owner of the split secret; always the block producer.
    pub sender: WitnessId,
    /// The only witness able to open this share.
    pub recipient: WitnessId,
    /// Sealed box bytes.
    pub ciphertext: Vec<u8>,
}

/// A share revealed in the open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedShare {
    /// Round the share belongs to.
    pub round: RoundNumber,
    /// Witness whose secret this share reconstructs.
    pub owner: WitnessId,
    /// Witness that decrypted and revealed the share.
    pub sender: WitnessId,
    /// Encoded share bytes.
    pub share: Vec<u8>,
}

/// Either kind of share envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShareEnvelope {
    Sealed(SealedShare),
    Opened(OpenedShare),
}

impl ShareEnvelope {
    /// The witness that emitted the envelope.
    pub fn sender(&self) -> WitnessId {
        match self {
            ShareEnvelope::Sealed(s) => s.sender,
            ShareEnvelope::Opened(o) => o.sender,
        }
    }

    /// The round the envelope belongs to.
    pub fn round(&self) -> RoundNumber {
        match self {
            ShareEnvelope::Sealed(s) => s.round,
            ShareEnvelope::Opened(o) => o.round,
        }
    }

    /// The recipient, for sealed envelopes. Opened envelopes go to everyone.
    pub fn recipient(&self) -> Option<WitnessId> {
        match self {
            ShareEnvelope::Sealed(s) => Some(s.recipient),
            ShareEnvelope::Opened(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_accessors() {
        let sealed = ShareEnvelope::Sealed(SealedShare {
            round: 4,
            sender: WitnessId(1),
            recipient: WitnessId(2),
            ciphertext: vec![1, 2, 3],
        });
        assert_eq!(sealed.sender(), WitnessId(1));
        assert_eq!(sealed.recipient(), Some(WitnessId(2)));
        assert_eq!(sealed.round(), 4);

        let opened = ShareEnvelope::Opened(OpenedShare {
            round: 4,
            owner: WitnessId(1),
            sender: WitnessId(3),
            share: vec![3, 2, 9],
        });
        assert_eq!(opened.sender(), WitnessId(3));
        assert_eq!(opened.recipient(), None);
    }

    #[test]
    fn test_envelope_json_is_tagged() {
        let opened = ShareEnvelope::Opened(OpenedShare {
            round: 1,
            owner: WitnessId(0),
            sender: WitnessId(2),
            share: vec![1],
        });
        let json = serde_json::to_value(&opened).expect("serialize");
        assert_eq!(json["kind"], "opened");
        let back: ShareEnvelope = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, opened);
    }
}
