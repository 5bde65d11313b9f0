//! The cosigner engine.
//!
//! A cosigner holds one Shamir share of the validator key. Per round (keyed
//! by HRST) it deals Shamir shares of a fresh ephemeral nonce, hands each
//! peer its share encrypted under the peer's RSA key, collects the parts
//! peers deal to it, and finally emits a partial Ed25519 signature once
//! enough slots are populated. Every public operation serializes on one
//! engine mutex; the durable sign-state write happens under that lock so
//! no signature leaves the process before its record is on disk.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SignerError};
use crate::messages::{
    EphemeralSecretPart, GetEphemeralSecretPartRequest, SetEphemeralSecretPartRequest,
    SignRequest, SignResponse,
};
use crate::sign_state::{SignState, SignStateConsensus};
use crate::vote::{unpack_hrst, HrstKey};
use vigil_crypto_core::{
    add_elements, add_scalars, deal_shares, element_from_bytes, lagrange_coefficient,
    scalar_from_canonical, scalar_multiply_base, sign_with_share, CryptoError,
};

/// This cosigner's long-lived signing material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CosignerKey {
    /// Cosigner ID, `1..=total`.
    #[zeroize(skip)]
    pub id: u8,
    /// Shamir share of the validator's Ed25519 key.
    pub share_key: Scalar,
    /// The group public key the cluster signs for.
    #[zeroize(skip)]
    pub group_public: [u8; 32],
}

/// A peer cosigner's authentication key.
#[derive(Clone)]
pub struct CosignerPeer {
    /// Peer ID, `1..=total`.
    pub id: u8,
    /// RSA public key for OAEP encryption to and PSS verification of this
    /// peer.
    pub rsa_public: RsaPublicKey,
}

/// A populated peer slot for one HRST.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PeerShare {
    /// The peer's dealt share of the round nonce, as delivered to us.
    pub share: [u8; 32],
    /// The peer's ephemeral public point (`secret · B`).
    pub ephemeral_public_key: [u8; 32],
}

/// Per-HRST signing metadata: our nonce, its dealt shares, and the peer
/// slots populated so far. Wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HrsMetadata {
    secret: Scalar,
    dealt_shares: Vec<Scalar>,
    peers: Vec<Option<PeerShare>>,
}

impl HrsMetadata {
    /// Our Shamir shares of the round nonce, one per cosigner.
    pub fn dealt_shares(&self) -> &[Scalar] {
        &self.dealt_shares
    }

    /// Peer slots, index `i` for cosigner `i + 1`; `None` until populated.
    pub fn peers(&self) -> &[Option<PeerShare>] {
        &self.peers
    }
}

/// Capability shared by all cosigner variants.
///
/// Implementations are thread-safe; request handlers call them
/// concurrently.
pub trait Cosigner {
    /// Deal nonce shares for the request's HRST, or return the existing
    /// ones. Dealing is randomized, so a round is dealt exactly once.
    fn deal_shares(&self, req: &GetEphemeralSecretPartRequest) -> Result<HrsMetadata>;

    /// Produce the requesting peer's encrypted share-part for one HRST.
    fn get_ephemeral_secret_part(
        &self,
        req: &GetEphemeralSecretPartRequest,
    ) -> Result<EphemeralSecretPart>;

    /// Verify and store a share-part a peer dealt to us.
    fn set_ephemeral_secret_part(&self, req: &SetEphemeralSecretPartRequest) -> Result<()>;

    /// Emit a partial signature over the request's sign bytes.
    fn sign(&self, req: &SignRequest) -> Result<SignResponse>;
}

struct EngineState {
    hrs_meta: HashMap<HrstKey, HrsMetadata>,
    last_sign_state: SignState,
}

/// Software cosigner: key material lives in process memory.
pub struct SoftSignCosigner {
    key: CosignerKey,
    rsa_key: RsaPrivateKey,
    peers: BTreeMap<u8, RsaPublicKey>,
    threshold: u8,
    total: u8,
    state: Mutex<EngineState>,
}

impl std::fmt::Debug for SoftSignCosigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftSignCosigner")
            .field("id", &self.key.id)
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl SoftSignCosigner {
    /// Build an engine from provisioned key material.
    pub fn new(
        key: CosignerKey,
        rsa_key: RsaPrivateKey,
        peers: Vec<CosignerPeer>,
        threshold: u8,
        total: u8,
        sign_state: SignState,
    ) -> Result<Self> {
        if threshold == 0 || threshold > total {
            return Err(SignerError::Config(format!(
                "unusable threshold {threshold}-of-{total}"
            )));
        }
        if key.id == 0 || key.id > total {
            return Err(SignerError::Config(format!(
                "cosigner id {} outside 1..={total}",
                key.id
            )));
        }

        let mut peer_keys = BTreeMap::new();
        for peer in peers {
            if peer.id == 0 || peer.id > total {
                return Err(SignerError::Config(format!(
                    "peer id {} outside 1..={total}",
                    peer.id
                )));
            }
            if peer.id == key.id {
                return Err(SignerError::Config(format!(
                    "peer list contains our own id {}",
                    peer.id
                )));
            }
            if peer_keys.insert(peer.id, peer.rsa_public).is_some() {
                return Err(SignerError::Config(format!("duplicate peer id {}", peer.id)));
            }
        }

        info!(
            id = key.id,
            threshold,
            total,
            peers = peer_keys.len(),
            "🔐 softsign cosigner ready"
        );

        Ok(SoftSignCosigner {
            key,
            rsa_key,
            peers: peer_keys,
            threshold,
            total,
            state: Mutex::new(EngineState {
                hrs_meta: HashMap::new(),
                last_sign_state: sign_state,
            }),
        })
    }

    /// This cosigner's ID.
    pub fn id(&self) -> u8 {
        self.key.id
    }

    /// The group public key the cluster signs for.
    pub fn group_public(&self) -> [u8; 32] {
        self.key.group_public
    }

    /// HRST keys with live metadata, oldest HRS first. Operational
    /// introspection; rounds below the last signed coordinates are
    /// garbage-collected by `sign`.
    pub fn pending_rounds(&self) -> Vec<HrstKey> {
        let mut rounds: Vec<HrstKey> = self.engine_state().hrs_meta.keys().copied().collect();
        rounds.sort_by_key(|key| (key.hrs(), key.timestamp));
        rounds
    }

    fn engine_state(&self) -> MutexGuard<'_, EngineState> {
        // Poisoning means a handler panicked mid-operation; the engine
        // state can no longer be trusted for double-sign protection.
        self.state.lock().expect("engine mutex poisoned")
    }

    /// Get-or-insert round metadata under the held engine lock.
    fn deal_shares_locked<'a>(
        &self,
        state: &'a mut EngineState,
        hrst: HrstKey,
    ) -> Result<&'a mut HrsMetadata> {
        match state.hrs_meta.entry(hrst) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(slot) => {
                let mut secret_bytes = [0u8; 32];
                OsRng.fill_bytes(&mut secret_bytes);
                let dealt = deal_shares(&mut OsRng, &secret_bytes, self.threshold, self.total)?;
                let secret = Scalar::from_bytes_mod_order(secret_bytes);
                secret_bytes.zeroize();

                debug!(coordinates = %hrst, "📝 dealt ephemeral nonce shares");
                Ok(slot.insert(HrsMetadata {
                    secret,
                    dealt_shares: dealt,
                    peers: vec![None; self.total as usize],
                }))
            }
        }
    }
}

impl Cosigner for SoftSignCosigner {
    fn deal_shares(&self, req: &GetEphemeralSecretPartRequest) -> Result<HrsMetadata> {
        let mut guard = self.engine_state();
        let meta = self.deal_shares_locked(&mut guard, req.hrst_key())?;
        Ok(meta.clone())
    }

    fn get_ephemeral_secret_part(
        &self,
        req: &GetEphemeralSecretPartRequest,
    ) -> Result<EphemeralSecretPart> {
        let mut guard = self.engine_state();
        let hrst = req.hrst_key();
        let meta = self.deal_shares_locked(&mut guard, hrst)?;

        let our_public = scalar_multiply_base(&meta.secret).compress().to_bytes();
        let self_idx = (self.key.id - 1) as usize;
        meta.peers[self_idx] = Some(PeerShare {
            share: meta.dealt_shares[self_idx].to_bytes(),
            ephemeral_public_key: our_public,
        });

        let peer_public = self
            .peers
            .get(&req.id)
            .ok_or(SignerError::UnknownPeer(req.id))?;
        let mut share = meta.dealt_shares[(req.id - 1) as usize].to_bytes();

        let mut rng = OsRng;
        let encrypted = peer_public.encrypt(&mut rng, Oaep::new::<Sha256>(), &share)?;
        share.zeroize();

        let mut part = EphemeralSecretPart {
            source_id: self.key.id,
            source_ephemeral_public_key: our_public,
            encrypted_share_part: encrypted,
            source_sig: Vec::new(),
            destination_id: req.id,
        };
        let digest = Sha256::digest(part.signed_surface()?);
        part.source_sig = self
            .rsa_key
            .sign_with_rng(&mut rng, Pss::new::<Sha256>(), digest.as_slice())?;

        debug!(
            coordinates = %hrst,
            destination = req.id,
            "📝 issued encrypted ephemeral share part"
        );
        Ok(part)
    }

    fn set_ephemeral_secret_part(&self, req: &SetEphemeralSecretPartRequest) -> Result<()> {
        if req.source_sig.is_empty() {
            return Err(SignerError::MissingSignature);
        }

        let digest = Sha256::digest(req.signed_surface()?);
        let peer_public = self
            .peers
            .get(&req.source_id)
            .ok_or(SignerError::UnknownPeer(req.source_id))?;
        peer_public
            .verify(Pss::new::<Sha256>(), digest.as_slice(), &req.source_sig)
            .map_err(|_| SignerError::PeerAuth)?;

        let mut guard = self.engine_state();
        let hrst = req.hrst_key();
        let meta = self.deal_shares_locked(&mut guard, hrst)?;

        let mut plaintext = self
            .rsa_key
            .decrypt(Oaep::new::<Sha256>(), &req.encrypted_share_part)?;
        let share: [u8; 32] =
            plaintext
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    field: "peer share part",
                    expected: 32,
                    actual: plaintext.len(),
                })?;
        plaintext.zeroize();

        meta.peers[(req.source_id - 1) as usize] = Some(PeerShare {
            share,
            ephemeral_public_key: req.source_ephemeral_public_key,
        });

        debug!(
            coordinates = %hrst,
            source = req.source_id,
            "📝 stored peer ephemeral share part"
        );
        Ok(())
    }

    fn sign(&self, req: &SignRequest) -> Result<SignResponse> {
        let mut guard = self.engine_state();
        let state = &mut *guard;

        let hrst = unpack_hrst(&req.sign_bytes)?;
        let same_hrs = state.last_sign_state.check_hrs(&hrst)?;

        if same_hrs {
            let held = state.last_sign_state.consensus();
            if held.sign_bytes == req.sign_bytes {
                debug!(coordinates = %hrst, "replaying previously emitted signature");
                return Ok(SignResponse {
                    ephemeral_public: held.ephemeral_public,
                    signature: held.signature,
                });
            }
            // Same coordinates may be re-signed only when the sign bytes
            // differ in nothing but their timestamp.
            state.last_sign_state.only_differ_by_timestamp(&req.sign_bytes)?;
        }

        let meta = state
            .hrs_meta
            .get(&hrst)
            .ok_or(SignerError::NoMetadataForHrs(hrst.hrs()))?;

        let mut ids = Vec::new();
        let mut shares = Vec::new();
        let mut publics = Vec::new();
        for (idx, slot) in meta.peers.iter().enumerate() {
            if let Some(peer) = slot {
                ids.push(idx as u8 + 1);
                shares.push(
                    scalar_from_canonical(peer.share)
                        .map_err(|_| SignerError::EphemeralShareOutOfBounds)?,
                );
                publics.push(element_from_bytes(peer.ephemeral_public_key)?);
            }
        }
        if ids.len() < self.threshold as usize {
            return Err(SignerError::InsufficientShares {
                got: ids.len(),
                need: self.threshold,
            });
        }

        let ephemeral_share = add_scalars(&shares);
        let ephemeral_public = add_elements(&publics).compress().to_bytes();

        // Fold our interpolation coefficient over the active subset into
        // both shares, so the cluster's fragments recombine by addition.
        let lambda = lagrange_coefficient(self.key.id, &ids)?;
        let fragment = sign_with_share(
            &req.sign_bytes,
            &(lambda * self.key.share_key),
            &(lambda * ephemeral_share).to_bytes(),
            &self.key.group_public,
            &ephemeral_public,
        )?;

        let record = SignStateConsensus {
            height: hrst.height,
            round: hrst.round,
            step: hrst.step,
            signature: fragment,
            sign_bytes: req.sign_bytes.clone(),
            ephemeral_public,
        };
        match state.last_sign_state.save(record) {
            Ok(()) | Err(SignerError::SameHrs) => {}
            Err(err) => return Err(err),
        }

        // Lower rounds can no longer be signed; drop their metadata.
        let floor = hrst.hrs();
        let before = state.hrs_meta.len();
        state.hrs_meta.retain(|key, _| key.hrs() >= floor);
        let dropped = before - state.hrs_meta.len();
        if dropped > 0 {
            debug!(dropped, "🧹 cleaned up stale round metadata");
        }

        info!(
            coordinates = %hrst,
            participants = ?ids,
            "✅ emitted partial signature"
        );
        Ok(SignResponse {
            ephemeral_public,
            signature: fragment,
        })
    }
}

/// Cosigner variant backed by an external hardware security module.
///
/// Hardware-backed signing has not shipped; every operation reports
/// `Unimplemented` so a misconfigured deployment fails loudly without
/// panicking a request handler.
pub struct HsmCosigner;

impl Cosigner for HsmCosigner {
    fn deal_shares(&self, _req: &GetEphemeralSecretPartRequest) -> Result<HrsMetadata> {
        Err(SignerError::Unimplemented("hsm deal_shares"))
    }

    fn get_ephemeral_secret_part(
        &self,
        _req: &GetEphemeralSecretPartRequest,
    ) -> Result<EphemeralSecretPart> {
        Err(SignerError::Unimplemented("hsm get_ephemeral_secret_part"))
    }

    fn set_ephemeral_secret_part(&self, _req: &SetEphemeralSecretPartRequest) -> Result<()> {
        Err(SignerError::Unimplemented("hsm set_ephemeral_secret_part"))
    }

    fn sign(&self, _req: &SignRequest) -> Result<SignResponse> {
        Err(SignerError::Unimplemented("hsm sign"))
    }
}
