//! Authenticated point-to-point sealing of shares (X25519-BLAKE3-ChaCha20-Poly1305).
//!
//! A sealed box can only be opened by the intended recipient, and only
//! under the public key of the sender that sealed it. Opening with any other
//! key pair fails authentication instead of returning garbage.
//!
//! ## Algorithm
//!
//! ```text
//! Seal(sender_sk, recipient_pk, plaintext; nonce):
//!   1. shared  = X25519(sender_sk, recipient_pk)
//!   2. key     = BLAKE3::derive_key("Beacon v1 sealed-box-key",
//!                  shared || sender_pk || recipient_pk)
//!   3. ct      = ChaCha20-Poly1305.Encrypt(key, nonce, plaintext,
//!                  aad = sender_pk || recipient_pk)
//!   4. return nonce || ct || tag
//! ```

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::blake3::{self, contexts};
use crate::x25519::{X25519PublicKey, X25519StaticSecret};
use crate::{CryptoError, Result};

/// ChaCha20-Poly1305 nonce size.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

/// Minimum length of a sealed box: nonce plus tag.
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// Seal with an explicit nonce.
///
/// The nonce must never repeat for the same (sender, recipient) pair.
pub fn seal_with_nonce(
    sender_sk: &X25519StaticSecret,
    recipient_pk: &X25519PublicKey,
    plaintext: &[u8],
    nonce: &[u8; NONCE_SIZE],
) -> Result<Vec<u8>> {
    let sender_pk = sender_sk.public_key();
    let key = box_key(sender_sk, &sender_pk, recipient_pk, recipient_pk)?;
    let aad = associated_data(&sender_pk, recipient_pk);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::SealedBox("encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Seal with a random nonce.
pub fn seal(
    sender_sk: &X25519StaticSecret,
    recipient_pk: &X25519PublicKey,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut nonce);
    seal_with_nonce(sender_sk, recipient_pk, plaintext, &nonce)
}

/// Open a sealed box addressed to `recipient_sk` from `sender_pk`.
pub fn open(
    recipient_sk: &X25519StaticSecret,
    sender_pk: &X25519PublicKey,
    sealed: &[u8],
) -> Result<Vec<u8>> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(CryptoError::SealedBox(format!(
            "sealed box too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce, body) = sealed.split_at(NONCE_SIZE);

    let recipient_pk = recipient_sk.public_key();
    let key = box_key(recipient_sk, sender_pk, &recipient_pk, sender_pk)?;
    let aad = associated_data(sender_pk, &recipient_pk);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: body,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::AeadDecryption)
}

/// Derive the symmetric box key.
///
/// `peer_pk` is the key the DH is computed against; the key material always
/// binds `sender_pk || recipient_pk` in that order.
fn box_key(
    own_sk: &X25519StaticSecret,
    sender_pk: &X25519PublicKey,
    recipient_pk: &X25519PublicKey,
    peer_pk: &X25519PublicKey,
) -> Result<[u8; 32]> {
    let shared = own_sk.diffie_hellman(peer_pk)?;
    let material = blake3::encode_multi_field(&[
        shared.as_bytes(),
        sender_pk.as_bytes(),
        recipient_pk.as_bytes(),
    ]);
    Ok(blake3::derive_key(contexts::SEALED_BOX_KEY, &material))
}

fn associated_data(sender_pk: &X25519PublicKey, recipient_pk: &X25519PublicKey) -> [u8; 64] {
    let mut aad = [0u8; 64];
    aad[..32].copy_from_slice(sender_pk.as_bytes());
    aad[32..].copy_from_slice(recipient_pk.as_bytes());
    aad
}
