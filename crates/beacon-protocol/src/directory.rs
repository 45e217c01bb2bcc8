//! Witness directory: stable id to public keys.
//!
//! The directory fixes the witness set and its order. A witness's position
//! in the directory is also the index of the share it receives from every
//! owner's split.

use std::collections::BTreeMap;

use beacon_crypto::ed25519::VerifyingKey;
use beacon_crypto::x25519::X25519PublicKey;
use beacon_types::WitnessId;

use crate::{ProtocolError, Result};

/// The public half of a witness's keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WitnessPublicKeys {
    /// Key that sealed shares are encrypted to and authenticated by.
    pub seal_key: X25519PublicKey,
    /// Key that verifies the witness's block records.
    pub verifying_key: VerifyingKey,
}

/// Public keys of every witness, ordered by id.
#[derive(Clone, Debug, Default)]
pub struct WitnessDirectory {
    entries: BTreeMap<WitnessId, WitnessPublicKeys>,
}

impl WitnessDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a witness's public keys.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::DuplicateWitness`] if the id is already registered
    pub fn register(&mut self, id: WitnessId, keys: WitnessPublicKeys) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(ProtocolError::DuplicateWitness(id));
        }
        self.entries.insert(id, keys);
        tracing::debug!(witness = %id, size = self.entries.len(), "witness registered");
        Ok(())
    }

    /// Look up a witness's keys.
    pub fn get(&self, id: WitnessId) -> Result<&WitnessPublicKeys> {
        self.entries.get(&id).ok_or(ProtocolError::UnknownWitness(id))
    }

    /// Check if a witness is registered.
    pub fn contains(&self, id: WitnessId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Position of a witness in directory order.
    pub fn position(&self, id: WitnessId) -> Option<usize> {
        self.entries.keys().position(|k| *k == id)
    }

    /// Witness ids in directory order.
    pub fn ids(&self) -> impl Iterator<Item = WitnessId> + '_ {
        self.entries.keys().copied()
    }

    /// `(id, keys)` pairs in directory order.
    pub fn iter(&self) -> impl Iterator<Item = (WitnessId, &WitnessPublicKeys)> {
        self.entries.iter().map(|(id, keys)| (*id, keys))
    }

    /// Number of witnesses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_crypto::ed25519::SigningKey;
    use beacon_crypto::x25519::X25519StaticSecret;

    fn keys() -> WitnessPublicKeys {
        WitnessPublicKeys {
            seal_key: X25519StaticSecret::random().public_key(),
            verifying_key: SigningKey::generate().verifying_key(),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut dir = WitnessDirectory::new();
        let k = keys();
        dir.register(WitnessId(7), k.clone()).expect("register");
        assert_eq!(dir.get(WitnessId(7)).expect("lookup"), &k);
        assert!(dir.get(WitnessId(8)).is_err());
        assert!(dir.contains(WitnessId(7)));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut dir = WitnessDirectory::new();
        dir.register(WitnessId(1), keys()).expect("first");
        assert!(matches!(
            dir.register(WitnessId(1), keys()),
            Err(ProtocolError::DuplicateWitness(WitnessId(1)))
        ));
    }

    #[test]
    fn test_order_is_by_id() {
        let mut dir = WitnessDirectory::new();
        for id in [5u32, 1, 3] {
            dir.register(WitnessId(id), keys()).expect("register");
        }
        let ids: Vec<_> = dir.ids().collect();
        assert_eq!(ids, vec![WitnessId(1), WitnessId(3), WitnessId(5)]);
        assert_eq!(dir.position(WitnessId(5)), Some(2));
        assert_eq!(dir.position(WitnessId(2)), None);
    }
}
