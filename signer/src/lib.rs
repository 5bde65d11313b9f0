//! # vigil-signer
//!
//! The local engine of a threshold Ed25519 cosigner cluster protecting a
//! BFT validator. One engine instance holds a Shamir share of the
//! validator's Ed25519 key plus an RSA keypair for peer authentication,
//! and exposes four operations to the RPC layer: deal per-round nonce
//! shares, hand an encrypted share-part to a peer, accept a peer's
//! share-part, and produce a partial signature over block sign-bytes.
//!
//! Double-signing is prevented by a durable last-signed record with
//! Height/Round/Step monotonicity; the only permitted re-sign at the same
//! coordinates is a timestamp-only rewrite of the sign-bytes.

pub mod config;
pub mod cosigner;
mod encoding;
pub mod error;
pub mod messages;
pub mod sign_state;
pub mod vote;

pub use config::{KeyFile, SignerMaterial};
pub use cosigner::{
    Cosigner, CosignerKey, CosignerPeer, HrsMetadata, HsmCosigner, PeerShare, SoftSignCosigner,
};
pub use error::{Result, SignerError};
pub use messages::{
    EphemeralSecretPart, GetEphemeralSecretPartRequest, SetEphemeralSecretPartRequest,
    SignRequest, SignResponse,
};
pub use sign_state::{SignState, SignStateConsensus};
pub use vote::{unpack_hrst, HrsKey, HrstKey, Vote, STEP_PRECOMMIT, STEP_PREVOTE, STEP_PROPOSE};
