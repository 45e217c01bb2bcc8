//! Integration test: redelivery, forgery and stale records.
//!
//! Exercises the failure paths of record processing:
//! 1. D's broadcast delivered twice to C counts once
//! 2. A forged opened share from outsider F plus one genuine share is
//!    recombined at count 2, fails the commitment check and is discarded
//! 3. Tampered and stale records are rejected without touching state
//! 4. A sealed share only opens for its recipient and from its sender

use std::sync::Arc;

use beacon_crypto::ed25519::SigningKey;
use beacon_crypto::suite::{CryptoSuite, StandardSuite};
use beacon_crypto::x25519::X25519StaticSecret;
use beacon_protocol::config::ProtocolConfig;
use beacon_protocol::directory::{WitnessDirectory, WitnessPublicKeys};
use beacon_protocol::signing::sign_record;
use beacon_protocol::witness::{TurnContext, Witness};
use beacon_protocol::ProtocolError;
use beacon_types::block::BlockRecord;
use beacon_types::envelope::OpenedShare;
use beacon_types::events::{FaultReason, ProtocolEvent};
use beacon_types::{Commitment, WitnessId, GENESIS_DIGEST};

const A: WitnessId = WitnessId(0);
const B: WitnessId = WitnessId(1);
const C: WitnessId = WitnessId(2);
const D: WitnessId = WitnessId(3);
const F: WitnessId = WitnessId(99);

fn setup(n: u32) -> (Vec<Witness>, WitnessDirectory) {
    let suite: Arc<dyn CryptoSuite> = Arc::new(StandardSuite);
    let mut directory = WitnessDirectory::new();
    let mut witnesses = Vec::new();
    for i in 0..n {
        let w = Witness::new(WitnessId(i), ProtocolConfig::with_threshold(2), suite.clone());
        directory.register(w.id(), w.public_keys()).expect("register");
        witnesses.push(w);
    }
    for w in &mut witnesses {
        w.begin_round(1).expect("begin round");
    }
    (witnesses, directory)
}

fn turn(turn: u32) -> TurnContext {
    TurnContext {
        round: 1,
        turn,
        previous: GENESIS_DIGEST,
    }
}

/// A then the given revealers produce; every record reaches every witness
/// in `audience` plus its producer.
fn publish(
    witnesses: &mut [Witness],
    directory: &WitnessDirectory,
    producer: WitnessId,
    t: u32,
    audience: &[WitnessId],
) -> BlockRecord {
    let idx = producer.0 as usize;
    let record = witnesses[idx]
        .produce_block(&turn(t), directory)
        .expect("produce");
    witnesses[idx]
        .process_block(&record, directory)
        .expect("self delivery");
    for id in audience {
        witnesses[id.0 as usize]
            .process_block(&record, directory)
            .expect("delivery");
    }
    record
}

#[test]
fn redelivered_broadcast_counts_once() {
    let (mut ws, dir) = setup(5);
    publish(&mut ws, &dir, A, 0, &[B, C, D]);
    let record_d = publish(&mut ws, &dir, D, 3, &[]);

    let first = ws[C.0 as usize]
        .process_block(&record_d, &dir)
        .expect("first delivery");
    assert_eq!(first.accepted, 1);
    assert!(first.events.is_empty());

    let second = ws[C.0 as usize]
        .process_block(&record_d, &dir)
        .expect("second delivery");
    assert_eq!(second.accepted, 0);
    assert_eq!(
        second.events,
        vec![ProtocolEvent::DuplicateShare {
            round: 1,
            observer: C,
            owner: A,
            sender: D,
        }]
    );

    let c = &ws[C.0 as usize];
    assert_eq!(c.contributions(A), 1);
    assert!(c.recovered_secret(A).is_none());
}

#[test]
fn forged_share_fails_commitment_check() {
    let (mut ws, mut dir) = setup(5);
    ws[A.0 as usize]
        .begin_round_with_secret(1, b"42".to_vec())
        .expect("chosen secret");

    // F is a registered outsider with its own keys.
    let f_key = SigningKey::generate();
    dir.register(
        F,
        WitnessPublicKeys {
            seal_key: X25519StaticSecret::random().public_key(),
            verifying_key: f_key.verifying_key(),
        },
    )
    .expect("register F");

    // =========================================================
    // Step 1: A publishes; B decrypts and reveals
    // =========================================================
    publish(&mut ws, &dir, A, 0, &[B, C]);
    let record_b = publish(&mut ws, &dir, B, 1, &[]);

    // =========================================================
    // Step 2: F publishes a well-formed share for A it never received
    // =========================================================
    let forged_share = StandardSuite
        .split(b"17", 2, 6)
        .expect("split")
        .pop()
        .expect("last share");
    let mut forged = BlockRecord {
        round: 1,
        turn: 5,
        producer: F,
        previous: GENESIS_DIGEST,
        commitment: Commitment(StandardSuite.hash(b"F's own secret")),
        sealed: Vec::new(),
        opened: vec![OpenedShare {
            round: 1,
            owner: A,
            sender: F,
            share: forged_share,
        }],
        signature: [0u8; 64],
    };
    sign_record(&f_key, &mut forged);

    let c = &mut ws[C.0 as usize];
    let receipt = c.process_block(&forged, &dir).expect("forged record");
    assert_eq!(receipt.accepted, 1);
    assert_eq!(c.contributions(A), 1);

    // =========================================================
    // Step 3: the genuine share brings the count to 2
    // =========================================================
    let receipt = c.process_block(&record_b, &dir).expect("genuine record");
    assert_eq!(
        receipt.events,
        vec![ProtocolEvent::IntegrityFault {
            round: 1,
            observer: C,
            owner: A,
            reason: FaultReason::CommitmentMismatch,
        }]
    );
    assert!(c.recovered_secret(A).is_none());

    let outcome = c.round_outcome(&dir);
    assert_eq!(outcome.faulted, vec![(A, FaultReason::CommitmentMismatch)]);
    assert!(!outcome.recovered.contains(&A));
}

#[test]
fn equivocating_owner_is_faulted() {
    let (mut ws, dir) = setup(3);
    let record_a = publish(&mut ws, &dir, A, 0, &[]);

    // A restarts the round with a new secret and publishes again.
    ws[A.0 as usize]
        .begin_round_with_secret(1, b"second".to_vec())
        .expect("rotate");
    let record_a2 = ws[A.0 as usize]
        .produce_block(&turn(1), &dir)
        .expect("produce again");

    let b = &mut ws[B.0 as usize];
    b.process_block(&record_a, &dir).expect("first commitment");
    let receipt = b.process_block(&record_a2, &dir).expect("second commitment");
    assert!(receipt.events.iter().any(|e| matches!(
        e,
        ProtocolEvent::IntegrityFault {
            owner: A,
            reason: FaultReason::CommitmentConflict,
            ..
        }
    )));
}

#[test]
fn tampered_record_leaves_state_untouched() {
    let (mut ws, dir) = setup(3);
    let mut record_a = ws[A.0 as usize]
        .produce_block(&turn(0), &dir)
        .expect("produce");
    record_a.sealed.swap(0, 1);

    let b = &mut ws[B.0 as usize];
    assert!(matches!(
        b.process_block(&record_a, &dir),
        Err(ProtocolError::InvalidSignature(A))
    ));
    assert_eq!(b.pending_reveals(), 0);
    assert!(b.recovery_state(A).is_none());
}

#[test]
fn unknown_producer_rejected() {
    let (mut ws, dir) = setup(3);
    let mut record = ws[A.0 as usize]
        .produce_block(&turn(0), &dir)
        .expect("produce");
    record.producer = F;
    assert!(matches!(
        ws[B.0 as usize].process_block(&record, &dir),
        Err(ProtocolError::UnknownWitness(F))
    ));
}

#[test]
fn stale_round_record_rejected_after_rotation() {
    let (mut ws, dir) = setup(5);
    publish(&mut ws, &dir, A, 0, &[B, C]);
    let record_b = publish(&mut ws, &dir, B, 1, &[C]);
    assert_eq!(ws[C.0 as usize].contributions(A), 1);

    let c = &mut ws[C.0 as usize];
    c.begin_round(2).expect("next round");
    assert_eq!(c.contributions(A), 0);
    assert_eq!(c.pending_reveals(), 0);

    assert!(matches!(
        c.process_block(&record_b, &dir),
        Err(ProtocolError::RoundMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert_eq!(c.contributions(A), 0);
}

#[test]
fn record_survives_json_transport() {
    let (mut ws, dir) = setup(3);
    let record = ws[A.0 as usize]
        .produce_block(&turn(0), &dir)
        .expect("produce");
    let wire = serde_json::to_vec(&record).expect("encode");
    let received: BlockRecord = serde_json::from_slice(&wire).expect("decode");

    let receipt = ws[B.0 as usize]
        .process_block(&received, &dir)
        .expect("process");
    assert_eq!(receipt.decrypted, 1);
}

#[test]
fn sealed_share_opens_only_for_its_pair() {
    let suite = StandardSuite;
    let a = X25519StaticSecret::random();
    let b = X25519StaticSecret::random();
    let c = X25519StaticSecret::random();
    let message = b"share bytes";

    let sealed = suite
        .seal(&a, &b.public_key(), message)
        .expect("seal");
    assert_eq!(
        suite.open(&b, &a.public_key(), &sealed).expect("open"),
        message.to_vec()
    );
    assert!(suite.open(&c, &a.public_key(), &sealed).is_err());
    assert!(suite.open(&b, &c.public_key(), &sealed).is_err());
    assert!(suite.open(&a, &b.public_key(), &sealed).is_err());
}
