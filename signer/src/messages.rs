//! Request and response envelopes exchanged between cosigners.
//!
//! These are the payloads the RPC layer moves; the engine defines them so
//! the signed surface of a share-part envelope is fixed in one place. The
//! canonical encoding is JSON with declaration-order fields and hex byte
//! strings, and those exact bytes are what RSA-PSS signatures cover.

use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::Result;
use crate::vote::HrstKey;

/// Ask a cosigner for our share of its ephemeral nonce for one HRST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEphemeralSecretPartRequest {
    /// Block height.
    pub height: i64,
    /// Consensus round.
    pub round: i64,
    /// Consensus step.
    pub step: u8,
    /// Vote timestamp, nanoseconds since the epoch.
    pub timestamp: i64,
    /// ID of the cosigner the share is for.
    pub id: u8,
}

impl GetEphemeralSecretPartRequest {
    /// The HRST coordinates this request keys on.
    pub fn hrst_key(&self) -> HrstKey {
        HrstKey {
            height: self.height,
            round: self.round,
            step: self.step,
            timestamp: self.timestamp,
        }
    }
}

/// One cosigner's encrypted share-part for a peer, with sender proof.
///
/// `source_sig` is an RSA-PSS signature over the canonical encoding of
/// `{source_id, source_ephemeral_public_key, encrypted_share_part}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralSecretPart {
    /// ID of the dealing cosigner.
    pub source_id: u8,
    /// The dealer's ephemeral public point (`secret · B`).
    #[serde(with = "encoding::hex_array")]
    pub source_ephemeral_public_key: [u8; 32],
    /// The receiver's Shamir share, RSA-OAEP encrypted to it.
    #[serde(with = "encoding::hex_vec")]
    pub encrypted_share_part: Vec<u8>,
    /// RSA-PSS signature over the signed surface.
    #[serde(with = "encoding::hex_vec")]
    pub source_sig: Vec<u8>,
    /// ID of the receiving cosigner.
    pub destination_id: u8,
}

impl EphemeralSecretPart {
    /// The canonical bytes `source_sig` covers.
    pub fn signed_surface(&self) -> Result<Vec<u8>> {
        signed_surface(
            self.source_id,
            &self.source_ephemeral_public_key,
            &self.encrypted_share_part,
        )
    }
}

/// Deliver a peer's share-part to the local engine.
///
/// Carries the same envelope as [`EphemeralSecretPart`] plus the HRST the
/// share belongs to. The HRST fields ride outside the signed surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEphemeralSecretPartRequest {
    /// ID of the dealing cosigner.
    pub source_id: u8,
    /// The dealer's ephemeral public point.
    #[serde(with = "encoding::hex_array")]
    pub source_ephemeral_public_key: [u8; 32],
    /// Our Shamir share, RSA-OAEP encrypted to us.
    #[serde(with = "encoding::hex_vec")]
    pub encrypted_share_part: Vec<u8>,
    /// RSA-PSS signature over the signed surface.
    #[serde(with = "encoding::hex_vec")]
    pub source_sig: Vec<u8>,
    /// ID of the receiving cosigner.
    pub destination_id: u8,
    /// Block height.
    pub height: i64,
    /// Consensus round.
    pub round: i64,
    /// Consensus step.
    pub step: u8,
    /// Vote timestamp, nanoseconds since the epoch.
    pub timestamp: i64,
}

impl SetEphemeralSecretPartRequest {
    /// The HRST coordinates this share belongs to.
    pub fn hrst_key(&self) -> HrstKey {
        HrstKey {
            height: self.height,
            round: self.round,
            step: self.step,
            timestamp: self.timestamp,
        }
    }

    /// The canonical bytes `source_sig` covers.
    pub fn signed_surface(&self) -> Result<Vec<u8>> {
        signed_surface(
            self.source_id,
            &self.source_ephemeral_public_key,
            &self.encrypted_share_part,
        )
    }
}

/// Ask the engine for a partial signature over block sign-bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRequest {
    /// Canonical vote sign-bytes.
    #[serde(with = "encoding::hex_vec")]
    pub sign_bytes: Vec<u8>,
}

/// A partial signature plus the round's aggregated ephemeral point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    /// Aggregated ephemeral public point (`R`).
    #[serde(with = "encoding::hex_array")]
    pub ephemeral_public: [u8; 32],
    /// Signature fragment (`R ‖ s_i`).
    #[serde(with = "encoding::hex_array")]
    pub signature: [u8; 64],
}

/// The authenticated portion of a share-part envelope, in canonical form.
#[derive(Serialize)]
struct SignedSurface {
    source_id: u8,
    #[serde(with = "encoding::hex_array")]
    source_ephemeral_public_key: [u8; 32],
    #[serde(with = "encoding::hex_vec")]
    encrypted_share_part: Vec<u8>,
}

fn signed_surface(
    source_id: u8,
    source_ephemeral_public_key: &[u8; 32],
    encrypted_share_part: &[u8],
) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&SignedSurface {
        source_id,
        source_ephemeral_public_key: *source_ephemeral_public_key,
        encrypted_share_part: encrypted_share_part.to_vec(),
    })?)
}
