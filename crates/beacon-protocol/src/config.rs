//! Protocol parameters.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

/// Default reconstruction threshold.
pub const DEFAULT_THRESHOLD: usize = 2;

/// Default round secret length in bytes.
pub const DEFAULT_SECRET_LEN: usize = 32;

/// Largest witness set the share encoding supports.
pub const MAX_WITNESSES: usize = beacon_crypto::shamir::MAX_SHARES;

/// Parameters shared by every witness and the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Shares needed to reconstruct an owner's secret (t in t-of-n).
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    /// Length of the fresh secret drawn every round.
    #[serde(default = "default_secret_len")]
    pub secret_len: usize,
    /// Turns to wait after decrypting a share before revealing it.
    /// 0 reveals at the witness's next turn.
    #[serde(default)]
    pub reveal_delay_turns: u32,
    /// Re-broadcast opened shares received from others, once per round.
    #[serde(default)]
    pub forward_opened: bool,
}

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

fn default_secret_len() -> usize {
    DEFAULT_SECRET_LEN
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            secret_len: DEFAULT_SECRET_LEN,
            reveal_delay_turns: 0,
            forward_opened: false,
        }
    }
}

impl ProtocolConfig {
    /// Create a configuration with the given threshold and default policy.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Check the parameters against a witness set of `witness_count`.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidConfig`] if the threshold is zero or exceeds
    ///   the witness count, the witness set is empty or too large, or the
    ///   secret length is zero
    pub fn validate(&self, witness_count: usize) -> Result<()> {
        if witness_count == 0 {
            return Err(ProtocolError::InvalidConfig(
                "witness set is empty".to_string(),
            ));
        }
        if witness_count > MAX_WITNESSES {
            return Err(ProtocolError::InvalidConfig(format!(
                "{witness_count} witnesses exceeds the maximum of {MAX_WITNESSES}"
            )));
        }
        if self.threshold == 0 || self.threshold > witness_count {
            return Err(ProtocolError::InvalidConfig(format!(
                "invalid threshold {} for {witness_count} witnesses",
                self.threshold
            )));
        }
        if self.secret_len == 0 {
            return Err(ProtocolError::InvalidConfig(
                "secret length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
