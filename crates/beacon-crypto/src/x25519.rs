//! X25519 key agreement (RFC 7748).
//!
//! Every witness holds one long-lived X25519 secret. Sealed shares are
//! encrypted under the static-static agreement between the sender's secret
//! and the recipient's published public key.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{CryptoError, Result};

/// An X25519 static secret key.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct X25519StaticSecret {
    inner: StaticSecret,
}

/// An X25519 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey {
    bytes: [u8; 32],
}

/// An X25519 shared secret.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret {
    bytes: [u8; 32],
}

impl X25519StaticSecret {
    /// Generate a new random static secret.
    pub fn random() -> Self {
        Self {
            inner: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            inner: StaticSecret::from(bytes),
        }
    }

    /// Compute the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        let pk = PublicKey::from(&self.inner);
        X25519PublicKey {
            bytes: pk.to_bytes(),
        }
    }

    /// Perform Diffie-Hellman key agreement.
    ///
    /// Fails if the peer key is a low-order point, which would yield an
    /// all-zero shared secret.
    pub fn diffie_hellman(&self, their_public: &X25519PublicKey) -> Result<SharedSecret> {
        let pk = PublicKey::from(their_public.bytes);
        let shared = self.inner.diffie_hellman(&pk);
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidInput(
                "non-contributory X25519 public key".to_string(),
            ));
        }
        Ok(SharedSecret {
            bytes: *shared.as_bytes(),
        })
    }
}

impl std::fmt::Debug for X25519StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519StaticSecret")
            .field("public", &self.public_key())
            .finish()
    }
}

impl X25519PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    /// Get the raw bytes as a slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl SharedSecret {
    /// Get the raw bytes of the shared secret.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}
