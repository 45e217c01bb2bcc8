//! Block record digests and producer signatures.
//!
//! The digest covers every field of the record except the signature, in a
//! length-prefixed encoding, so reordering or truncating envelopes changes it.

use beacon_crypto::blake3::{self, contexts};
use beacon_crypto::ed25519::{Signature, SigningKey, VerifyingKey};
use beacon_types::block::BlockRecord;
use beacon_types::Hash;

use crate::{ProtocolError, Result};

/// Digest of a record as it is signed and linked in the ledger.
pub fn record_digest(record: &BlockRecord) -> Hash {
    let round = record.round.to_le_bytes();
    let turn = record.turn.to_le_bytes();
    let producer = record.producer.to_le_bytes();

    let mut sealed = Vec::new();
    for s in &record.sealed {
        sealed.extend_from_slice(&blake3::encode_multi_field(&[
            &s.round.to_le_bytes(),
            &s.sender.to_le_bytes(),
            &s.recipient.to_le_bytes(),
            &s.ciphertext,
        ]));
    }

    let mut opened = Vec::new();
    for o in &record.opened {
        opened.extend_from_slice(&blake3::encode_multi_field(&[
            &o.round.to_le_bytes(),
            &o.owner.to_le_bytes(),
            &o.sender.to_le_bytes(),
            &o.share,
        ]));
    }

    let encoded = blake3::encode_multi_field(&[
        &round,
        &turn,
        &producer,
        &record.previous,
        record.commitment.as_bytes(),
        &(record.sealed.len() as u32).to_le_bytes(),
        &sealed,
        &(record.opened.len() as u32).to_le_bytes(),
        &opened,
    ]);
    blake3::derive_key(contexts::BLOCK_DIGEST, &encoded)
}

/// Sign a record in place with the producer's key.
pub fn sign_record(key: &SigningKey, record: &mut BlockRecord) {
    let digest = record_digest(record);
    record.signature = key.sign(&digest).to_bytes();
}

/// Verify a record's producer signature.
///
/// # Errors
///
/// - [`ProtocolError::InvalidSignature`] if the signature does not match
pub fn verify_record(key: &VerifyingKey, record: &BlockRecord) -> Result<()> {
    let digest = record_digest(record);
    key.verify(&digest, &Signature::from_bytes(&record.signature))
        .map_err(|_| ProtocolError::InvalidSignature(record.producer))
}
