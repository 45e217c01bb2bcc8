//! Append-only ordered sequence of block records.
//!
//! Every record links to the digest of the record before it (the first to
//! [`GENESIS_DIGEST`]) and positions `(round, turn)` strictly increase.

use beacon_types::block::BlockRecord;
use beacon_types::{Hash, RoundNumber, GENESIS_DIGEST};

use crate::directory::WitnessDirectory;
use crate::signing::{record_digest, verify_record};
use crate::{ProtocolError, Result};

/// The global record sequence shared by every witness.
#[derive(Clone, Debug, Default)]
pub struct BlockLedger {
    records: Vec<BlockRecord>,
    tip: Option<Hash>,
}

impl BlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Digest the next record must link to.
    pub fn tip(&self) -> Hash {
        self.tip.unwrap_or(GENESIS_DIGEST)
    }

    /// Append a record that extends the tip.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::LedgerLink`] if the record does not link to the tip
    ///   or its position is not after the last record
    pub fn append(&mut self, record: BlockRecord) -> Result<Hash> {
        let tip = self.tip();
        if record.previous != tip {
            return Err(ProtocolError::LedgerLink(format!(
                "record {}:{} links to {}, tip is {}",
                record.round,
                record.turn,
                hex::encode(record.previous),
                hex::encode(tip)
            )));
        }
        if let Some(last) = self.records.last() {
            if record.position() <= last.position() {
                return Err(ProtocolError::LedgerLink(format!(
                    "record {}:{} is not after {}:{}",
                    record.round, record.turn, last.round, last.turn
                )));
            }
        }

        let digest = record_digest(&record);
        tracing::debug!(
            round = record.round,
            turn = record.turn,
            producer = %record.producer,
            height = self.records.len(),
            digest = %hex::encode(digest),
            "record appended"
        );
        self.records.push(record);
        self.tip = Some(digest);
        Ok(digest)
    }

    /// Re-check linkage, ordering and every producer signature.
    pub fn verify(&self, directory: &WitnessDirectory) -> Result<()> {
        let mut previous = GENESIS_DIGEST;
        let mut last: Option<(RoundNumber, u32)> = None;
        for record in &self.records {
            if record.previous != previous {
                return Err(ProtocolError::LedgerLink(format!(
                    "broken link at {}:{}",
                    record.round, record.turn
                )));
            }
            if last.is_some_and(|p| record.position() <= p) {
                return Err(ProtocolError::LedgerLink(format!(
                    "out of order at {}:{}",
                    record.round, record.turn
                )));
            }
            let keys = directory.get(record.producer)?;
            verify_record(&keys.verifying_key, record)?;

            previous = record_digest(record);
            last = Some(record.position());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, height: usize) -> Option<&BlockRecord> {
        self.records.get(height)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockRecord> {
        self.records.iter()
    }

    /// Records published in `round`, in turn order.
    pub fn round(&self, round: RoundNumber) -> impl Iterator<Item = &BlockRecord> {
        self.records.iter().filter(move |r| r.round == round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::WitnessPublicKeys;
    use crate::signing::sign_record;
    use beacon_crypto::ed25519::SigningKey;
    use beacon_crypto::x25519::X25519StaticSecret;
    use beacon_types::{Commitment, WitnessId};

    struct Producer {
        id: WitnessId,
        key: SigningKey,
    }

    fn setup() -> (Producer, WitnessDirectory) {
        let producer = Producer {
            id: WitnessId(0),
            key: SigningKey::generate(),
        };
        let mut dir = WitnessDirectory::new();
        dir.register(
            producer.id,
            WitnessPublicKeys {
                seal_key: X25519StaticSecret::random().public_key(),
                verifying_key: producer.key.verifying_key(),
            },
        )
        .expect("register");
        (producer, dir)
    }

    fn record(p: &Producer, round: RoundNumber, turn: u32, previous: Hash) -> BlockRecord {
        let mut r = BlockRecord {
            round,
            turn,
            producer: p.id,
            previous,
            commitment: Commitment([turn as u8; 32]),
            sealed: Vec::new(),
            opened: Vec::new(),
            signature: [0u8; 64],
        };
        sign_record(&p.key, &mut r);
        r
    }

    #[test]
    fn test_append_chain_and_verify() {
        let (p, dir) = setup();
        let mut ledger = BlockLedger::new();
        assert_eq!(ledger.tip(), GENESIS_DIGEST);

        let d0 = ledger.append(record(&p, 1, 0, GENESIS_DIGEST)).expect("first");
        let d1 = ledger.append(record(&p, 1, 1, d0)).expect("second");
        ledger.append(record(&p, 2, 0, d1)).expect("next round");

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.round(1).count(), 2);
        assert!(ledger.verify(&dir).is_ok());
    }

    #[test]
    fn test_wrong_link_rejected() {
        let (p, _) = setup();
        let mut ledger = BlockLedger::new();
        ledger.append(record(&p, 1, 0, GENESIS_DIGEST)).expect("first");
        assert!(matches!(
            ledger.append(record(&p, 1, 1, GENESIS_DIGEST)),
            Err(ProtocolError::LedgerLink(_))
        ));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_backwards_position_rejected() {
        let (p, _) = setup();
        let mut ledger = BlockLedger::new();
        let d0 = ledger.append(record(&p, 2, 3, GENESIS_DIGEST)).expect("first");
        assert!(ledger.append(record(&p, 2, 3, d0)).is_err());
        assert!(ledger.append(record(&p, 1, 9, d0)).is_err());
    }

    #[test]
    fn test_verify_detects_unknown_producer() {
        let (p, _) = setup();
        let mut ledger = BlockLedger::new();
        ledger.append(record(&p, 1, 0, GENESIS_DIGEST)).expect("first");
        assert!(matches!(
            ledger.verify(&WitnessDirectory::new()),
            Err(ProtocolError::UnknownWitness(_))
        ));
    }
}
