//! Integration tests: full cosigner rounds over an in-process cluster.
//!
//! Each test stands up a small cluster of `SoftSignCosigner` engines with
//! freshly dealt key shares, runs the share exchange the RPC layer would
//! drive, and checks the double-sign state machine plus the emitted
//! signatures.

use std::sync::OnceLock;

use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use tempfile::TempDir;

use vigil_crypto_core::{
    combine_signature_fragments, deal_shares, scalar_multiply_base, verify_signature,
};
use vigil_signer::{
    Cosigner, CosignerKey, CosignerPeer, EphemeralSecretPart, GetEphemeralSecretPartRequest,
    SetEphemeralSecretPartRequest, SignRequest, SignState, SignerError, SoftSignCosigner, Vote,
    STEP_PREVOTE, STEP_PROPOSE,
};

const T0: i64 = 1_700_000_000_000_000_000;
const SECOND: i64 = 1_000_000_000;

/// RSA keygen dominates test runtime, so generate one fixed set of
/// 1024-bit test keys and share it across tests.
fn rsa_keys() -> &'static [RsaPrivateKey] {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    KEYS.get_or_init(|| {
        (0..3)
            .map(|_| RsaPrivateKey::new(&mut OsRng, 1024).expect("rsa keygen"))
            .collect()
    })
}

struct Cluster {
    cosigners: Vec<SoftSignCosigner>,
    group_public: [u8; 32],
    _dirs: Vec<TempDir>,
}

fn cluster(total: u8, threshold: u8) -> Cluster {
    let group_secret = Scalar::random(&mut OsRng);
    let group_public = scalar_multiply_base(&group_secret).compress().to_bytes();
    let key_shares =
        deal_shares(&mut OsRng, &group_secret.to_bytes(), threshold, total).unwrap();

    let mut cosigners = Vec::new();
    let mut dirs = Vec::new();
    for id in 1..=total {
        let peers = (1..=total)
            .filter(|&peer| peer != id)
            .map(|peer| CosignerPeer {
                id: peer,
                rsa_public: rsa_keys()[peer as usize - 1].to_public_key(),
            })
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let sign_state = SignState::load_or_create(dir.path().join("state.json")).unwrap();
        cosigners.push(
            SoftSignCosigner::new(
                CosignerKey {
                    id,
                    share_key: key_shares[id as usize - 1],
                    group_public,
                },
                rsa_keys()[id as usize - 1].clone(),
                peers,
                threshold,
                total,
                sign_state,
            )
            .unwrap(),
        );
        dirs.push(dir);
    }

    Cluster {
        cosigners,
        group_public,
        _dirs: dirs,
    }
}

impl Cluster {
    fn cosigner(&self, id: u8) -> &SoftSignCosigner {
        &self.cosigners[id as usize - 1]
    }

    /// Run the share exchange for `subset` at the vote's HRST: every
    /// member hands every other member its encrypted part.
    fn exchange(&self, subset: &[u8], vote: &Vote) {
        for &dealer in subset {
            for &receiver in subset {
                if dealer == receiver {
                    continue;
                }
                let part = self
                    .cosigner(dealer)
                    .get_ephemeral_secret_part(&get_request(vote, receiver))
                    .unwrap();
                self.cosigner(receiver)
                    .set_ephemeral_secret_part(&set_request(&part, vote))
                    .unwrap();
            }
        }
    }

    /// Sign on every subset member and return the summed signature.
    fn sign_and_combine(&self, subset: &[u8], vote: &Vote) -> [u8; 64] {
        let sign_bytes = vote.sign_bytes().unwrap();
        let fragments: Vec<[u8; 64]> = subset
            .iter()
            .map(|&id| {
                self.cosigner(id)
                    .sign(&SignRequest {
                        sign_bytes: sign_bytes.clone(),
                    })
                    .unwrap()
                    .signature
            })
            .collect();
        combine_signature_fragments(&fragments).unwrap()
    }
}

fn prevote(height: i64, round: i64, timestamp: i64, block: u8) -> Vote {
    Vote {
        vote_type: STEP_PREVOTE,
        height,
        round,
        block_id: vec![block; 32],
        timestamp,
        chain_id: "vigil-test".into(),
    }
}

fn get_request(vote: &Vote, receiver: u8) -> GetEphemeralSecretPartRequest {
    GetEphemeralSecretPartRequest {
        height: vote.height,
        round: vote.round,
        step: vote.vote_type,
        timestamp: vote.timestamp,
        id: receiver,
    }
}

fn set_request(part: &EphemeralSecretPart, vote: &Vote) -> SetEphemeralSecretPartRequest {
    SetEphemeralSecretPartRequest {
        source_id: part.source_id,
        source_ephemeral_public_key: part.source_ephemeral_public_key,
        encrypted_share_part: part.encrypted_share_part.clone(),
        source_sig: part.source_sig.clone(),
        destination_id: part.destination_id,
        height: vote.height,
        round: vote.round,
        step: vote.vote_type,
        timestamp: vote.timestamp,
    }
}

#[test]
fn two_of_two_round_produces_verifiable_signature() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    cluster.exchange(&[1, 2], &vote);

    let signature = cluster.sign_and_combine(&[1, 2], &vote);
    assert!(verify_signature(
        &vote.sign_bytes().unwrap(),
        &cluster.group_public,
        &signature
    ));
}

#[test]
fn two_of_three_subset_produces_verifiable_signature() {
    let cluster = cluster(3, 2);
    let vote = prevote(20, 1, T0, 0xbb);
    cluster.exchange(&[1, 3], &vote);

    let signature = cluster.sign_and_combine(&[1, 3], &vote);
    assert!(verify_signature(
        &vote.sign_bytes().unwrap(),
        &cluster.group_public,
        &signature
    ));
}

#[test]
fn replayed_sign_request_is_idempotent() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    cluster.exchange(&[1, 2], &vote);

    let request = SignRequest {
        sign_bytes: vote.sign_bytes().unwrap(),
    };
    let first = cluster.cosigner(1).sign(&request).unwrap();
    let second = cluster.cosigner(1).sign(&request).unwrap();
    assert_eq!(first, second);
}

#[test]
fn timestamp_only_rewrite_signs_again_with_fresh_nonce() {
    let cluster = cluster(2, 2);
    let vote_a = prevote(10, 0, T0, 0xaa);
    let vote_b = prevote(10, 0, T0 + SECOND, 0xaa);
    cluster.exchange(&[1, 2], &vote_a);
    cluster.exchange(&[1, 2], &vote_b);

    let first = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote_a.sign_bytes().unwrap(),
        })
        .unwrap();
    let second = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote_b.sign_bytes().unwrap(),
        })
        .unwrap();

    assert_ne!(first.signature, second.signature);
    // A later timestamp keys a fresh nonce, so R changes too.
    assert_ne!(first.ephemeral_public, second.ephemeral_public);
}

#[test]
fn conflicting_block_at_same_coordinates_is_refused() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    cluster.exchange(&[1, 2], &vote);

    let original = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote.sign_bytes().unwrap(),
        })
        .unwrap();

    let conflicting = prevote(10, 0, T0, 0xcc);
    let err = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: conflicting.sign_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, SignerError::ConflictingData));

    // Persisted state is untouched: the original still replays.
    let replay = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote.sign_bytes().unwrap(),
        })
        .unwrap();
    assert_eq!(replay, original);
}

#[test]
fn regression_is_refused_and_leaves_no_metadata() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    cluster.exchange(&[1, 2], &vote);
    cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote.sign_bytes().unwrap(),
        })
        .unwrap();

    let mut earlier = prevote(10, 0, T0, 0xaa);
    earlier.vote_type = STEP_PROPOSE;
    let err = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: earlier.sign_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, SignerError::Regression { .. }));

    let earlier_hrst = earlier.hrst_key().unwrap();
    assert!(!cluster
        .cosigner(1)
        .pending_rounds()
        .contains(&earlier_hrst));
}

#[test]
fn forged_source_id_is_rejected_and_slot_stays_empty() {
    let cluster = cluster(3, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    cluster
        .cosigner(1)
        .deal_shares(&get_request(&vote, 2))
        .unwrap();

    // Cosigner 2 signs its envelope honestly, then claims to be cosigner 3.
    let part = cluster
        .cosigner(2)
        .get_ephemeral_secret_part(&get_request(&vote, 1))
        .unwrap();
    let mut forged = set_request(&part, &vote);
    forged.source_id = 3;

    let err = cluster
        .cosigner(1)
        .set_ephemeral_secret_part(&forged)
        .unwrap_err();
    assert!(matches!(err, SignerError::PeerAuth));

    // No slot was populated, so signing cannot reach the threshold.
    let err = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote.sign_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, SignerError::InsufficientShares { got: 0, .. }));
}

#[test]
fn tampered_envelope_is_rejected() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);

    let part = cluster
        .cosigner(2)
        .get_ephemeral_secret_part(&get_request(&vote, 1))
        .unwrap();

    let mut tampered = set_request(&part, &vote);
    tampered.encrypted_share_part[0] ^= 0x01;
    let err = cluster
        .cosigner(1)
        .set_ephemeral_secret_part(&tampered)
        .unwrap_err();
    assert!(matches!(err, SignerError::PeerAuth));

    let mut unsigned = set_request(&part, &vote);
    unsigned.source_sig.clear();
    let err = cluster
        .cosigner(1)
        .set_ephemeral_secret_part(&unsigned)
        .unwrap_err();
    assert!(matches!(err, SignerError::MissingSignature));
}

#[test]
fn unknown_peer_cannot_request_a_share() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    let err = cluster
        .cosigner(1)
        .get_ephemeral_secret_part(&get_request(&vote, 9))
        .unwrap_err();
    assert!(matches!(err, SignerError::UnknownPeer(9)));
}

#[test]
fn sign_without_metadata_is_refused() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);
    let err = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote.sign_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, SignerError::NoMetadataForHrs(_)));
}

#[test]
fn sign_below_threshold_is_refused() {
    let cluster = cluster(3, 2);
    let vote = prevote(10, 0, T0, 0xaa);

    // Issuing a part fills only the dealer's own slot.
    cluster
        .cosigner(1)
        .get_ephemeral_secret_part(&get_request(&vote, 2))
        .unwrap();
    let err = cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: vote.sign_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        SignerError::InsufficientShares { got: 1, need: 2 }
    ));
}

#[test]
fn dealing_is_idempotent_per_hrst() {
    let cluster = cluster(2, 2);
    let vote = prevote(10, 0, T0, 0xaa);

    let first = cluster
        .cosigner(1)
        .deal_shares(&get_request(&vote, 2))
        .unwrap();
    let second = cluster
        .cosigner(1)
        .deal_shares(&get_request(&vote, 2))
        .unwrap();
    assert_eq!(first.dealt_shares(), second.dealt_shares());

    // A different timestamp keys a separate deal.
    let later = prevote(10, 0, T0 + SECOND, 0xaa);
    let third = cluster
        .cosigner(1)
        .deal_shares(&get_request(&later, 2))
        .unwrap();
    assert_ne!(first.dealt_shares(), third.dealt_shares());
}

#[test]
fn signing_garbage_collects_older_rounds() {
    let cluster = cluster(2, 2);
    let old_a = prevote(5, 0, T0, 0xaa);
    let old_b = prevote(6, 0, T0, 0xaa);
    let current = prevote(7, 0, T0, 0xaa);
    cluster.exchange(&[1, 2], &old_a);
    cluster.exchange(&[1, 2], &old_b);
    cluster.exchange(&[1, 2], &current);
    assert_eq!(cluster.cosigner(1).pending_rounds().len(), 3);

    cluster
        .cosigner(1)
        .sign(&SignRequest {
            sign_bytes: current.sign_bytes().unwrap(),
        })
        .unwrap();

    let remaining = cluster.cosigner(1).pending_rounds();
    assert_eq!(remaining, vec![current.hrst_key().unwrap()]);
}

#[test]
fn sign_state_survives_engine_restart() {
    let group_secret = Scalar::random(&mut OsRng);
    let group_public = scalar_multiply_base(&group_secret).compress().to_bytes();
    let key_shares = deal_shares(&mut OsRng, &group_secret.to_bytes(), 2, 2).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");

    let build = |sign_state: SignState| {
        SoftSignCosigner::new(
            CosignerKey {
                id: 1,
                share_key: key_shares[0],
                group_public,
            },
            rsa_keys()[0].clone(),
            vec![CosignerPeer {
                id: 2,
                rsa_public: rsa_keys()[1].to_public_key(),
            }],
            2,
            2,
            sign_state,
        )
        .unwrap()
    };

    let vote = prevote(10, 0, T0, 0xaa);
    {
        let engine = build(SignState::load_or_create(&state_path).unwrap());
        // Hand-fill both slots via the exchange against a throwaway peer
        // engine sharing our key set.
        let peer_dir = tempfile::tempdir().unwrap();
        let peer = SoftSignCosigner::new(
            CosignerKey {
                id: 2,
                share_key: key_shares[1],
                group_public,
            },
            rsa_keys()[1].clone(),
            vec![CosignerPeer {
                id: 1,
                rsa_public: rsa_keys()[0].to_public_key(),
            }],
            2,
            2,
            SignState::load_or_create(peer_dir.path().join("state.json")).unwrap(),
        )
        .unwrap();

        let part = peer
            .get_ephemeral_secret_part(&get_request(&vote, 1))
            .unwrap();
        engine
            .set_ephemeral_secret_part(&set_request(&part, &vote))
            .unwrap();
        engine
            .get_ephemeral_secret_part(&get_request(&vote, 2))
            .unwrap();
        engine
            .sign(&SignRequest {
                sign_bytes: vote.sign_bytes().unwrap(),
            })
            .unwrap();
    }

    // After a restart the durable record still refuses regressions.
    let engine = build(SignState::load_or_create(&state_path).unwrap());
    let mut earlier = vote.clone();
    earlier.vote_type = STEP_PROPOSE;
    let err = engine
        .sign(&SignRequest {
            sign_bytes: earlier.sign_bytes().unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, SignerError::Regression { .. }));
}
