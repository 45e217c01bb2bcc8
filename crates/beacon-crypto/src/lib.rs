//! # beacon-crypto
//!
//! Cryptographic capabilities consumed by the witness randomness beacon.
//!
//! The beacon protocol only relies on the input/output contracts of these
//! primitives. The [`suite::CryptoSuite`] trait is that contract; the
//! [`suite::StandardSuite`] backend wires it to the concrete algorithms below.
//!
//! ## Modules
//!
//! - [`blake3`]: Domain-separated BLAKE3 hashing and commitments
//! - [`ed25519`]: Ed25519 signing and verification for block records
//! - [`x25519`]: X25519 key agreement (RFC 7748)
//! - [`sealed_box`]: Authenticated point-to-point share encryption (ChaCha20-Poly1305)
//! - [`shamir`]: Threshold secret sharing over GF(256)
//! - [`suite`]: The capability trait and its standard backend

pub mod blake3;
pub mod ed25519;
pub mod sealed_box;
pub mod shamir;
pub mod suite;
pub mod x25519;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// AEAD decryption failed (authentication tag mismatch).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Sealed box could not be parsed or opened.
    #[error("sealed box error: {0}")]
    SealedBox(String),

    /// Threshold or share count outside the supported range.
    #[error("invalid threshold {threshold} for {shares} shares")]
    InvalidThreshold { threshold: usize, shares: usize },

    /// Fewer shares than the threshold were supplied.
    #[error("not enough shares: need {required}, have {available}")]
    NotEnoughShares { required: usize, available: usize },

    /// Two shares carry the same evaluation point.
    #[error("duplicate share index {0}")]
    DuplicateShareIndex(u8),

    /// Shares disagree on threshold or payload length.
    #[error("inconsistent shares: {0}")]
    InconsistentShares(String),

    /// A share could not be decoded.
    #[error("malformed share: {0}")]
    MalformedShare(String),

    /// Invalid input data.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
