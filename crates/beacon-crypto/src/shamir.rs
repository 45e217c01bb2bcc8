//! Threshold secret sharing over GF(256).
//!
//! A secret of any length is split byte-wise: every byte is the constant
//! term of its own random polynomial of degree `threshold - 1`, and share
//! `i` holds the evaluations at `x = i` (1-based). Any `threshold` shares
//! reconstruct the secret by Lagrange interpolation at zero; fewer reveal
//! nothing about it.
//!
//! Shares travel as opaque bytes: `index || threshold || data`.
//!
//! Shares carry no integrity protection. Callers detect forged or foreign
//! shares by checking the reconstructed value against a commitment.

use rand::RngCore;
use zeroize::Zeroize;

use crate::{CryptoError, Result};

/// Largest number of shares a secret can be split into.
pub const MAX_SHARES: usize = 255;

/// Bytes of header in front of the share payload.
pub const SHARE_HEADER_LEN: usize = 2;

/// A single share of a split secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Share {
    /// Evaluation point, non-zero and unique per split.
    pub index: u8,
    /// Number of shares needed for reconstruction.
    pub threshold: u8,
    /// One evaluation per secret byte.
    pub data: Vec<u8>,
}

impl Share {
    /// Encode as `index || threshold || data`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SHARE_HEADER_LEN + self.data.len());
        out.push(self.index);
        out.push(self.threshold);
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode from `index || threshold || data`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() <= SHARE_HEADER_LEN {
            return Err(CryptoError::MalformedShare(format!(
                "share too short: {} bytes",
                bytes.len()
            )));
        }
        let index = bytes[0];
        let threshold = bytes[1];
        if index == 0 {
            return Err(CryptoError::MalformedShare(
                "share index 0 is reserved for the secret".to_string(),
            ));
        }
        if threshold == 0 {
            return Err(CryptoError::MalformedShare(
                "share threshold is zero".to_string(),
            ));
        }
        Ok(Self {
            index,
            threshold,
            data: bytes[SHARE_HEADER_LEN..].to_vec(),
        })
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// Split `secret` into `count` shares, any `threshold` of which recombine it.
///
/// # Errors
///
/// - [`CryptoError::InvalidInput`] if the secret is empty
/// - [`CryptoError::InvalidThreshold`] unless `1 <= threshold <= count <= 255`
pub fn split(secret: &[u8], threshold: usize, count: usize) -> Result<Vec<Share>> {
    if secret.is_empty() {
        return Err(CryptoError::InvalidInput("secret is empty".to_string()));
    }
    if threshold == 0 || threshold > count || count > MAX_SHARES {
        return Err(CryptoError::InvalidThreshold {
            threshold,
            shares: count,
        });
    }

    let mut shares: Vec<Share> = (1..=count)
        .map(|index| Share {
            index: index as u8,
            threshold: threshold as u8,
            data: vec![0u8; secret.len()],
        })
        .collect();

    let mut rng = rand::rngs::OsRng;
    let mut coeffs = vec![0u8; threshold];

    for (byte_index, &s) in secret.iter().enumerate() {
        coeffs[0] = s;
        rng.fill_bytes(&mut coeffs[1..]);

        for share in &mut shares {
            share.data[byte_index] = gf256::eval_poly(&coeffs, share.index);
        }
    }
    coeffs.zeroize();

    Ok(shares)
}

/// Recombine the secret from at least `threshold` shares.
///
/// Only the first `threshold` shares are interpolated. Shares from a
/// different split produce an unrelated value rather than an error.
///
/// # Errors
///
/// - [`CryptoError::NotEnoughShares`] if fewer than `threshold` are given
/// - [`CryptoError::DuplicateShareIndex`] if two shares use the same point
/// - [`CryptoError::InconsistentShares`] on threshold or length mismatch
pub fn combine(shares: &[Share]) -> Result<Vec<u8>> {
    let first = shares.first().ok_or(CryptoError::NotEnoughShares {
        required: 1,
        available: 0,
    })?;
    let threshold = first.threshold as usize;
    let secret_len = first.data.len();

    if threshold == 0 {
        return Err(CryptoError::MalformedShare("share threshold is zero".to_string()));
    }
    if shares.len() < threshold {
        return Err(CryptoError::NotEnoughShares {
            required: threshold,
            available: shares.len(),
        });
    }

    let used = &shares[..threshold];
    let mut seen = [false; 256];
    for share in used {
        if share.index == 0 {
            return Err(CryptoError::MalformedShare(
                "share index 0 is reserved for the secret".to_string(),
            ));
        }
        if seen[share.index as usize] {
            return Err(CryptoError::DuplicateShareIndex(share.index));
        }
        seen[share.index as usize] = true;

        if share.threshold as usize != threshold {
            return Err(CryptoError::InconsistentShares(format!(
                "share {} has threshold {}, expected {threshold}",
                share.index, share.threshold
            )));
        }
        if share.data.len() != secret_len {
            return Err(CryptoError::InconsistentShares(format!(
                "share {} has length {}, expected {secret_len}",
                share.index,
                share.data.len()
            )));
        }
    }

    let xs: Vec<u8> = used.iter().map(|s| s.index).collect();
    let weights = gf256::lagrange_weights_at_zero(&xs);

    let mut secret = vec![0u8; secret_len];
    for (byte_index, out) in secret.iter_mut().enumerate() {
        *out = used
            .iter()
            .zip(&weights)
            .fold(0u8, |acc, (share, &w)| acc ^ gf256::mul(share.data[byte_index], w));
    }

    Ok(secret)
}

/// Arithmetic in GF(2^8) modulo the AES polynomial x^8 + x^4 + x^3 + x + 1.
mod gf256 {
    const REDUCTION: u8 = 0x1b;

    pub(super) fn mul(mut a: u8, mut b: u8) -> u8 {
        let mut product = 0u8;
        while b != 0 {
            if b & 1 != 0 {
                product ^= a;
            }
            let carry = a & 0x80;
            a <<= 1;
            if carry != 0 {
                a ^= REDUCTION;
            }
            b >>= 1;
        }
        product
    }

    /// `a^254 = a^-1` for non-zero `a`. Zero maps to zero.
    pub(super) fn inv(a: u8) -> u8 {
        let mut result = 1u8;
        let mut base = a;
        let mut exp = 254u8;
        while exp != 0 {
            if exp & 1 != 0 {
                result = mul(result, base);
            }
            base = mul(base, base);
            exp >>= 1;
        }
        result
    }

    /// Horner evaluation, coefficients in increasing degree.
    pub(super) fn eval_poly(coeffs: &[u8], x: u8) -> u8 {
        coeffs.iter().rev().fold(0u8, |acc, &c| mul(acc, x) ^ c)
    }

    /// Lagrange basis values `l_i(0)` for distinct non-zero points.
    pub(super) fn lagrange_weights_at_zero(xs: &[u8]) -> Vec<u8> {
        xs.iter()
            .enumerate()
            .map(|(i, &xi)| {
                let mut num = 1u8;
                let mut den = 1u8;
                for (j, &xj) in xs.iter().enumerate() {
                    if i != j {
                        num = mul(num, xj);
                        // Subtraction is XOR in characteristic 2.
                        den = mul(den, xj ^ xi);
                    }
                }
                mul(num, inv(den))
            })
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_32() -> Vec<u8> {
        (0..32u8).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect()
    }

    #[test]
    fn test_any_threshold_subset_recombines() {
        let secret = secret_32();
        for n in 1..=6usize {
            for t in 1..=n {
                let shares = split(&secret, t, n).expect("split");
                assert_eq!(shares.len(), n);
                // Every contiguous window of t shares.
                for start in 0..=(n - t) {
                    let subset = &shares[start..start + t];
                    assert_eq!(combine(subset).expect("combine"), secret, "t={t} n={n}");
                }
                // Reversed order also works.
                let reversed: Vec<Share> = shares.iter().rev().take(t).cloned().collect();
                assert_eq!(combine(&reversed).expect("combine"), secret);
            }
        }
    }

    #[test]
    fn test_two_of_five_recovers_42() {
        let secret = vec![42u8];
        let shares = split(&secret, 2, 5).expect("split");
        let subset = vec![shares[1].clone(), shares[3].clone()];
        assert_eq!(combine(&subset).expect("combine"), secret);
    }

    #[test]
    fn test_below_threshold_rejected() {
        let shares = split(&secret_32(), 3, 5).expect("split");
        let result = combine(&shares[..2]);
        assert!(matches!(
            result,
            Err(CryptoError::NotEnoughShares {
                required: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_below_threshold_interpolation_does_not_reveal() {
        // Lie about the threshold to force interpolation over t-1 points.
        let secret = secret_32();
        let shares = split(&secret, 3, 5).expect("split");
        let forged: Vec<Share> = shares[..2]
            .iter()
            .map(|s| Share {
                index: s.index,
                threshold: 2,
                data: s.data.clone(),
            })
            .collect();
        let candidate = combine(&forged).expect("interpolates");
        assert_ne!(candidate, secret);
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let shares = split(&secret_32(), 2, 3).expect("split");
        let dup = vec![shares[0].clone(), shares[0].clone()];
        assert!(matches!(combine(&dup), Err(CryptoError::DuplicateShareIndex(1))));
    }

    #[test]
    fn test_foreign_share_does_not_crash() {
        let a = split(&secret_32(), 2, 3).expect("split a");
        let b = split(&[7u8; 32], 2, 3).expect("split b");
        let mixed = vec![a[0].clone(), b[1].clone()];
        let candidate = combine(&mixed).expect("interpolates");
        assert_ne!(candidate, secret_32());
    }

    #[test]
    fn test_inconsistent_length_rejected() {
        let a = split(&secret_32(), 2, 3).expect("split a");
        let b = split(&[7u8; 8], 2, 3).expect("split b");
        let mixed = vec![a[0].clone(), b[1].clone()];
        assert!(matches!(combine(&mixed), Err(CryptoError::InconsistentShares(_))));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(split(&[], 1, 1).is_err());
        assert!(split(b"x", 0, 3).is_err());
        assert!(split(b"x", 4, 3).is_err());
        assert!(split(b"x", 2, 256).is_err());
    }

    #[test]
    fn test_share_bytes_roundtrip() {
        let shares = split(b"beacon", 2, 3).expect("split");
        let encoded = shares[2].to_bytes();
        assert_eq!(encoded[0], 3);
        assert_eq!(encoded[1], 2);
        assert_eq!(Share::from_bytes(&encoded).expect("decode"), shares[2]);
    }

    #[test]
    fn test_malformed_share_bytes() {
        assert!(Share::from_bytes(&[]).is_err());
        assert!(Share::from_bytes(&[1, 2]).is_err());
        assert!(Share::from_bytes(&[0, 2, 5]).is_err());
        assert!(Share::from_bytes(&[1, 0, 5]).is_err());
    }
}
