//! Witness state: keys, round secret, block production and block processing.
//!
//! A witness holds its long-lived keys, the secret for the current round and
//! the per-round caches that feed its [`Recoverer`]. The private keys and the
//! round secret never leave this type; everything a witness publishes goes
//! out through [`Witness::produce_block`].
//!
//! ## Turn Flow
//!
//! 1. [`Witness::begin_round`] draws a fresh secret and drops every cache
//! 2. On its turn the witness produces one block record: commitment, one
//!    sealed share per peer, and the opened shares its reveal policy releases
//! 3. Every record published in the round, its own included, goes through
//!    [`Witness::process_block`], which decrypts sealed shares addressed to
//!    this witness and absorbs opened shares into the recoverer

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use beacon_crypto::blake3::{self, contexts};
use beacon_crypto::ed25519::SigningKey;
use beacon_crypto::suite::CryptoSuite;
use beacon_crypto::x25519::X25519StaticSecret;
use beacon_types::block::BlockRecord;
use beacon_types::envelope::{OpenedShare, SealedShare};
use beacon_types::events::{FaultReason, ProtocolEvent};
use beacon_types::{Commitment, Hash, RoundNumber, WitnessId};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::ProtocolConfig;
use crate::directory::{WitnessDirectory, WitnessPublicKeys};
use crate::recoverer::{Absorbed, Recoverer, RecoveryState};
use crate::signing;
use crate::{ProtocolError, Result};

/// Where in the round a block is being produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnContext {
    pub round: RoundNumber,
    pub turn: u32,
    /// Digest of the ledger tip the new record extends.
    pub previous: Hash,
}

/// What processing one block record did to a witness.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockReceipt {
    /// Sealed shares addressed to this witness that were decrypted.
    pub decrypted: usize,
    /// Opened shares counted toward a bucket.
    pub accepted: usize,
    /// Events raised while absorbing the record.
    pub events: Vec<ProtocolEvent>,
}

/// A witness's view of the round once every turn has run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WitnessRoundOutcome {
    pub witness: WitnessId,
    pub round: RoundNumber,
    /// Owners whose secret was recovered and verified.
    pub recovered: Vec<WitnessId>,
    /// Owners whose reconstruction was rejected.
    pub faulted: Vec<(WitnessId, FaultReason)>,
    /// Owners that never settled, with the number of distinct senders seen.
    pub insufficient: Vec<(WitnessId, usize)>,
    /// Beacon output derived from the recovered secrets.
    pub randomness: Option<Hash>,
}

/// A share decrypted from an owner's record, waiting to be revealed.
struct PendingReveal {
    share: Zeroizing<Vec<u8>>,
    decrypted_turn: u32,
}

/// One participant in the beacon.
pub struct Witness {
    id: WitnessId,
    config: ProtocolConfig,
    suite: Arc<dyn CryptoSuite>,
    seal_secret: X25519StaticSecret,
    signing_key: SigningKey,
    online: bool,

    round: RoundNumber,
    secret: Zeroizing<Vec<u8>>,
    commitment: Option<Commitment>,
    pending: BTreeMap<WitnessId, PendingReveal>,
    revealed: BTreeSet<WitnessId>,
    forwardable: BTreeMap<(WitnessId, WitnessId), Zeroizing<Vec<u8>>>,
    forwarded: BTreeSet<(WitnessId, WitnessId)>,
    recoverer: Recoverer,
}

impl std::fmt::Debug for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Witness")
            .field("id", &self.id)
            .field("round", &self.round)
            .field("online", &self.online)
            .field("commitment", &self.commitment)
            .finish_non_exhaustive()
    }
}

impl Witness {
    /// Create a witness with freshly generated keys.
    pub fn new(id: WitnessId, config: ProtocolConfig, suite: Arc<dyn CryptoSuite>) -> Self {
        Self::with_keys(
            id,
            config,
            suite,
            X25519StaticSecret::random(),
            SigningKey::generate(),
        )
    }

    /// Create a witness from existing keys.
    pub fn with_keys(
        id: WitnessId,
        config: ProtocolConfig,
        suite: Arc<dyn CryptoSuite>,
        seal_secret: X25519StaticSecret,
        signing_key: SigningKey,
    ) -> Self {
        let recoverer = Recoverer::new(id, config.threshold);
        Self {
            id,
            config,
            suite,
            seal_secret,
            signing_key,
            online: true,
            round: 0,
            secret: Zeroizing::new(Vec::new()),
            commitment: None,
            pending: BTreeMap::new(),
            revealed: BTreeSet::new(),
            forwardable: BTreeMap::new(),
            forwarded: BTreeSet::new(),
            recoverer,
        }
    }

    pub fn id(&self) -> WitnessId {
        self.id
    }

    pub fn round(&self) -> RoundNumber {
        self.round
    }

    /// Keys to publish in the witness directory.
    pub fn public_keys(&self) -> WitnessPublicKeys {
        WitnessPublicKeys {
            seal_key: self.seal_secret.public_key(),
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Commitment to this round's secret, once a block has been produced.
    pub fn commitment(&self) -> Option<Commitment> {
        self.commitment
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Mark the witness as able or unable to produce blocks.
    pub fn set_online(&mut self, online: bool) {
        if self.online != online {
            tracing::info!(witness = %self.id, online, "witness availability changed");
        }
        self.online = online;
    }

    /// Start `round` with a fresh random secret.
    pub fn begin_round(&mut self, round: RoundNumber) -> Result<()> {
        let mut secret = vec![0u8; self.config.secret_len];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        self.begin_round_with_secret(round, secret)
    }

    /// Start `round` with a caller-chosen secret.
    ///
    /// Every cache from the previous round is dropped: pending reveals,
    /// the reveal and forward ledgers, and all recoverer buckets.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidConfig`] if the secret is empty
    pub fn begin_round_with_secret(&mut self, round: RoundNumber, secret: Vec<u8>) -> Result<()> {
        if secret.is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "round secret must not be empty".to_string(),
            ));
        }

        self.secret = Zeroizing::new(secret);
        self.round = round;
        self.commitment = None;
        self.pending.clear();
        self.revealed.clear();
        self.forwardable.clear();
        self.forwarded.clear();
        self.recoverer.reset(round);

        tracing::debug!(witness = %self.id, round, "round secret rotated");
        Ok(())
    }

    /// Produce this witness's block record for the turn.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Round, turn and ledger tip the record extends
    /// * `directory` - The witness set; share `i` goes to the witness at position `i`
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Offline`] if the witness is offline
    /// - [`ProtocolError::RoundMismatch`] if `ctx` is for another round
    /// - [`ProtocolError::InvalidConfig`] if the parameters do not fit the directory
    /// - [`ProtocolError::Crypto`] if splitting or sealing fails
    pub fn produce_block(
        &mut self,
        ctx: &TurnContext,
        directory: &WitnessDirectory,
    ) -> Result<BlockRecord> {
        if !self.online {
            return Err(ProtocolError::Offline(self.id));
        }
        if ctx.round != self.round {
            return Err(ProtocolError::RoundMismatch {
                expected: self.round,
                actual: ctx.round,
            });
        }
        if !directory.contains(self.id) {
            return Err(ProtocolError::UnknownWitness(self.id));
        }
        self.config.validate(directory.len())?;

        let shares = Zeroizing::new(self.suite.split(
            &self.secret,
            self.config.threshold,
            directory.len(),
        )?);

        let mut sealed = Vec::with_capacity(directory.len().saturating_sub(1));
        for ((recipient, keys), share) in directory.iter().zip(shares.iter()) {
            if recipient == self.id {
                continue;
            }
            let ciphertext = self.suite.seal(&self.seal_secret, &keys.seal_key, share)?;
            sealed.push(SealedShare {
                round: self.round,
                sender: self.id,
                recipient,
                ciphertext,
            });
        }

        let commitment = Commitment(self.suite.hash(&self.secret));
        self.commitment = Some(commitment);

        let opened = self.release_opened(ctx.turn);

        let mut record = BlockRecord {
            round: self.round,
            turn: ctx.turn,
            producer: self.id,
            previous: ctx.previous,
            commitment,
            sealed,
            opened,
            signature: [0u8; 64],
        };
        signing::sign_record(&self.signing_key, &mut record);

        tracing::info!(
            witness = %self.id,
            round = self.round,
            turn = ctx.turn,
            sealed = record.sealed.len(),
            opened = record.opened.len(),
            commitment = %hex::encode(commitment.as_bytes()),
            "block produced"
        );

        Ok(record)
    }

    /// Opened shares the reveal policy releases at `turn`, each at most once per round.
    fn release_opened(&mut self, turn: u32) -> Vec<OpenedShare> {
        let delay = self.config.reveal_delay_turns;
        let mut opened = Vec::new();

        for (owner, pending) in &self.pending {
            if self.revealed.contains(owner) {
                continue;
            }
            let due = pending
                .decrypted_turn
                .saturating_add(1)
                .saturating_add(delay);
            if turn < due {
                continue;
            }
            opened.push(OpenedShare {
                round: self.round,
                owner: *owner,
                sender: self.id,
                share: pending.share.to_vec(),
            });
            self.revealed.insert(*owner);
        }

        if self.config.forward_opened {
            for ((owner, sender), share) in &self.forwardable {
                if self.forwarded.insert((*owner, *sender)) {
                    opened.push(OpenedShare {
                        round: self.round,
                        owner: *owner,
                        sender: *sender,
                        share: share.to_vec(),
                    });
                }
            }
        }

        opened
    }

    /// Process a block record published this round.
    ///
    /// The record is fully validated and every sealed share addressed to
    /// this witness is decrypted before any state changes, so a rejected
    /// record leaves the witness untouched. Processing the same record again
    /// leaves the buckets as they were; repeated opened shares are reported
    /// as duplicates.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::RoundMismatch`] if the record or an envelope is from another round
    /// - [`ProtocolError::UnknownWitness`] if the producer, or the owner or sender of an
    ///   opened share, is not in the directory
    /// - [`ProtocolError::InvalidSignature`] if the producer signature does not verify
    /// - [`ProtocolError::MisattributedShare`] if a sealed share is not from the producer
    /// - [`ProtocolError::Crypto`] if a sealed share addressed to this witness fails to open
    pub fn process_block(
        &mut self,
        record: &BlockRecord,
        directory: &WitnessDirectory,
    ) -> Result<BlockReceipt> {
        if record.round != self.round {
            return Err(ProtocolError::RoundMismatch {
                expected: self.round,
                actual: record.round,
            });
        }
        let producer = directory.get(record.producer)?;
        signing::verify_record(&producer.verifying_key, record)?;

        for s in &record.sealed {
            if s.sender != record.producer {
                return Err(ProtocolError::MisattributedShare {
                    producer: record.producer,
                    sender: s.sender,
                });
            }
            if s.round != record.round {
                return Err(ProtocolError::RoundMismatch {
                    expected: record.round,
                    actual: s.round,
                });
            }
        }
        for o in &record.opened {
            if o.round != record.round {
                return Err(ProtocolError::RoundMismatch {
                    expected: record.round,
                    actual: o.round,
                });
            }
            // Buckets only exist for directory members.
            for id in [o.owner, o.sender] {
                if !directory.contains(id) {
                    return Err(ProtocolError::UnknownWitness(id));
                }
            }
        }

        let mut decrypted = Vec::new();
        for s in record.sealed_for(self.id) {
            let share = self
                .suite
                .open(&self.seal_secret, &producer.seal_key, &s.ciphertext)?;
            decrypted.push(Zeroizing::new(share));
        }

        // Validated; apply.
        let mut receipt = BlockReceipt {
            decrypted: decrypted.len(),
            ..BlockReceipt::default()
        };

        receipt.events.extend(self.recoverer.record_commitment(
            self.suite.as_ref(),
            record.producer,
            record.commitment,
        ));

        if let Some(share) = decrypted.into_iter().next() {
            self.pending
                .entry(record.producer)
                .or_insert(PendingReveal {
                    share,
                    decrypted_turn: record.turn,
                });
        }

        for o in &record.opened {
            let (absorbed, events) =
                self.recoverer
                    .absorb(self.suite.as_ref(), o.owner, o.sender, &o.share);
            receipt.events.extend(events);
            if let Absorbed::Counted { .. } = absorbed {
                receipt.accepted += 1;
                if o.sender != self.id {
                    self.forwardable
                        .entry((o.owner, o.sender))
                        .or_insert_with(|| Zeroizing::new(o.share.clone()));
                }
            }
        }

        tracing::debug!(
            witness = %self.id,
            producer = %record.producer,
            round = record.round,
            turn = record.turn,
            decrypted = receipt.decrypted,
            accepted = receipt.accepted,
            "block processed"
        );

        Ok(receipt)
    }

    /// Distinct senders absorbed for `owner` this round.
    pub fn contributions(&self, owner: WitnessId) -> usize {
        self.recoverer.contributions(owner)
    }

    /// Reconstruction state for `owner`, if any share or fault exists.
    pub fn recovery_state(&self, owner: WitnessId) -> Option<&RecoveryState> {
        self.recoverer.state(owner)
    }

    /// Verified secret recovered for `owner` this round.
    pub fn recovered_secret(&self, owner: WitnessId) -> Option<&[u8]> {
        self.recoverer.recovered_secret(owner)
    }

    /// Number of decrypted shares not yet revealed.
    pub fn pending_reveals(&self) -> usize {
        self.pending
            .keys()
            .filter(|owner| !self.revealed.contains(owner))
            .count()
    }

    /// Summarize the round from this witness's point of view.
    pub fn round_outcome(&self, directory: &WitnessDirectory) -> WitnessRoundOutcome {
        let recovered: Vec<WitnessId> = self.recoverer.recovered().map(|(o, _)| o).collect();
        let faulted: Vec<(WitnessId, FaultReason)> = self
            .recoverer
            .faulted()
            .map(|(o, reason)| (o, reason.clone()))
            .collect();
        let insufficient = directory
            .ids()
            .filter(|owner| {
                !self
                    .recoverer
                    .state(*owner)
                    .is_some_and(RecoveryState::is_settled)
            })
            .map(|owner| (owner, self.recoverer.contributions(owner)))
            .collect();

        WitnessRoundOutcome {
            witness: self.id,
            round: self.round,
            recovered,
            faulted,
            insufficient,
            randomness: self.round_randomness(),
        }
    }

    /// Beacon value over every `(owner, secret)` recovered this round.
    fn round_randomness(&self) -> Option<Hash> {
        let round = self.round.to_le_bytes();
        let mut fields: Vec<Vec<u8>> = Vec::new();
        for (owner, secret) in self.recoverer.recovered() {
            fields.push(owner.to_le_bytes().to_vec());
            fields.push(secret.to_vec());
        }
        if fields.is_empty() {
            return None;
        }

        let mut refs: Vec<&[u8]> = vec![&round];
        refs.extend(fields.iter().map(Vec::as_slice));
        let encoded = Zeroizing::new(blake3::encode_multi_field(&refs));
        Some(blake3::derive_key(contexts::ROUND_RANDOMNESS, &encoded))
    }
}
