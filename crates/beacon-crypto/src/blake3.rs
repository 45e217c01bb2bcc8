//! Domain-separated BLAKE3 hashing for the beacon protocol.
//!
//! BLAKE3 is used for secret commitments, block digests, sealed-box key
//! derivation and the per-round randomness output. Cross-domain collisions
//! are prevented by BLAKE3's key derivation mode with a registered context
//! string per purpose.
//!
//! ## Modes
//!
//! - [`hash`]: Pure hashing
//! - [`derive_key`]: Key derivation and domain-separated digests
//! - [`keyed_hash`]: Keyed MAC/PRF

/// Registered BLAKE3 context strings.
/// Using an unregistered context string is a protocol violation.
pub mod contexts {
    pub const SECRET_COMMITMENT: &str = "Beacon v1 secret-commitment";
    pub const BLOCK_DIGEST: &str = "Beacon v1 block-digest";
    pub const SEALED_BOX_KEY: &str = "Beacon v1 sealed-box-key";
    pub const ROUND_RANDOMNESS: &str = "Beacon v1 round-randomness";

    /// All registered context strings. Used for validation.
    pub const ALL_CONTEXTS: &[&str] = &[
        SECRET_COMMITMENT,
        BLOCK_DIGEST,
        SEALED_BOX_KEY,
        ROUND_RANDOMNESS,
    ];
}

/// Compute BLAKE3 hash of the input data.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *::blake3::hash(data).as_bytes()
}

/// Derive a key using BLAKE3's built-in key derivation mode.
///
/// # Arguments
///
/// * `context` - A registered context string (must start with "Beacon v1 ")
/// * `key_material` - The input key material
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut hasher = ::blake3::Hasher::new_derive_key(context);
    hasher.update(key_material);
    let hash = hasher.finalize();
    out.copy_from_slice(hash.as_bytes());
    out
}

/// Compute a keyed BLAKE3 hash (MAC/PRF).
pub fn keyed_hash(key: &[u8; 32], message: &[u8]) -> [u8; 32] {
    *::blake3::keyed_hash(key, message).as_bytes()
}

/// Verify that a context string is registered.
pub fn is_registered_context(context: &str) -> bool {
    contexts::ALL_CONTEXTS.contains(&context)
}

/// Commit to a round secret.
///
/// `commitment = BLAKE3::derive_key("Beacon v1 secret-commitment", secret)`
pub fn commit(secret: &[u8]) -> [u8; 32] {
    derive_key(contexts::SECRET_COMMITMENT, secret)
}

/// Encode multiple dynamic fields using length-prefixed encoding.
///
/// `LE32(len(field1)) || field1 || LE32(len(field2)) || field2 || ...`
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    let total_len: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut output = Vec::with_capacity(total_len);
    for field in fields {
        output.extend_from_slice(&(field.len() as u32).to_le_bytes());
        output.extend_from_slice(field);
    }
    output
}
