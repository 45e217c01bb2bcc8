//! The cryptographic capability consumed by the beacon protocol.
//!
//! The protocol never calls the algorithm modules directly; it goes through
//! [`CryptoSuite`] so that a different threshold scheme or cipher can be
//! swapped in without touching witness logic.

use crate::shamir::{self, Share};
use crate::x25519::{X25519PublicKey, X25519StaticSecret};
use crate::{blake3, sealed_box, Result};

/// Threshold sharing, authenticated sealing and commitment hashing.
pub trait CryptoSuite: Send + Sync {
    /// Split `secret` into `shares` encoded shares, any `threshold` of which
    /// recombine it exactly. Share `i` (0-based) belongs to participant `i`.
    fn split(&self, secret: &[u8], threshold: usize, shares: usize) -> Result<Vec<Vec<u8>>>;

    /// Recombine encoded shares. Foreign or mismatched shares yield an error
    /// or an unrelated value, never a panic.
    fn recombine(&self, shares: &[Vec<u8>]) -> Result<Vec<u8>>;

    /// Seal `plaintext` from `sender` to `recipient`.
    fn seal(
        &self,
        sender: &X25519StaticSecret,
        recipient: &X25519PublicKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Open a box sealed by `sender` for `recipient`. Fails closed.
    fn open(
        &self,
        recipient: &X25519StaticSecret,
        sender: &X25519PublicKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;

    /// Commitment hash of a secret.
    fn hash(&self, data: &[u8]) -> [u8; 32];
}

/// GF(256) Shamir sharing, X25519/ChaCha20-Poly1305 sealing, BLAKE3 commitments.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardSuite;

impl CryptoSuite for StandardSuite {
    fn split(&self, secret: &[u8], threshold: usize, shares: usize) -> Result<Vec<Vec<u8>>> {
        Ok(shamir::split(secret, threshold, shares)?
            .iter()
            .map(Share::to_bytes)
            .collect())
    }

    fn recombine(&self, shares: &[Vec<u8>]) -> Result<Vec<u8>> {
        let decoded = shares
            .iter()
            .map(|bytes| Share::from_bytes(bytes))
            .collect::<Result<Vec<_>>>()?;
        shamir::combine(&decoded)
    }

    fn seal(
        &self,
        sender: &X25519StaticSecret,
        recipient: &X25519PublicKey,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        sealed_box::seal(sender, recipient, plaintext)
    }

    fn open(
        &self,
        recipient: &X25519StaticSecret,
        sender: &X25519PublicKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        sealed_box::open(recipient, sender, ciphertext)
    }

    fn hash(&self, data: &[u8]) -> [u8; 32] {
        blake3::commit(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_recombine_through_suite() {
        let suite = StandardSuite;
        let shares = suite.split(b"round secret", 3, 5).expect("split");
        assert_eq!(shares.len(), 5);
        let subset = vec![shares[4].clone(), shares[0].clone(), shares[2].clone()];
        assert_eq!(suite.recombine(&subset).expect("recombine"), b"round secret");
    }

    #[test]
    fn test_recombine_garbage_is_an_error() {
        let suite = StandardSuite;
        assert!(suite.recombine(&[vec![0xde, 0xad]]).is_err());
        assert!(suite.recombine(&[]).is_err());
    }

    #[test]
    fn test_seal_open_through_suite() {
        let suite = StandardSuite;
        let a = X25519StaticSecret::random();
        let b = X25519StaticSecret::random();
        let sealed = suite.seal(&a, &b.public_key(), b"m").expect("seal");
        assert_eq!(suite.open(&b, &a.public_key(), &sealed).expect("open"), b"m");
        assert!(suite.open(&a, &b.public_key(), &sealed).is_err());
    }

    #[test]
    fn test_hash_is_commitment() {
        let suite = StandardSuite;
        assert_eq!(suite.hash(&[42]), blake3::commit(&[42]));
    }
}
