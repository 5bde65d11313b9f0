//! Key-material files.
//!
//! A cosigner is provisioned with one JSON key file holding its ID, its
//! Shamir share of the validator key, the group public key, its RSA
//! private key (PKCS#8 PEM), and the RSA public keys of its peers (SPKI
//! PEM). Scalars and points are hex-encoded. Loading validates everything
//! eagerly so a bad deployment fails at startup, not mid-round.

use std::fs;
use std::path::Path;

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::cosigner::{CosignerKey, CosignerPeer};
use crate::error::{Result, SignerError};
use vigil_crypto_core::{element_from_bytes, scalar_from_canonical};

/// One peer's entry in the key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerEntry {
    /// Peer cosigner ID.
    pub id: u8,
    /// SPKI PEM encoding of the peer's RSA public key.
    pub rsa_public: String,
}

/// On-disk key material of one cosigner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    /// This cosigner's ID.
    pub id: u8,
    /// Hex-encoded Shamir share of the validator's Ed25519 key.
    pub share_key: String,
    /// Hex-encoded group public key.
    pub group_public: String,
    /// PKCS#8 PEM encoding of this cosigner's RSA private key.
    pub rsa_key: String,
    /// Peer authentication keys.
    pub peers: Vec<PeerEntry>,
}

/// Validated, decoded key material ready for the engine.
pub struct SignerMaterial {
    /// Long-lived signing material.
    pub key: CosignerKey,
    /// RSA private key for OAEP decryption and PSS signing.
    pub rsa_key: RsaPrivateKey,
    /// Peer RSA public keys.
    pub peers: Vec<CosignerPeer>,
}

impl KeyFile {
    /// Read and parse a key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    /// Write the key file as JSON. Used by provisioning tooling.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(fs::write(path, serde_json::to_vec_pretty(self)?)?)
    }

    /// Decode and validate the key material.
    pub fn into_material(self) -> Result<SignerMaterial> {
        let share_bytes = decode_hex32("share_key", &self.share_key)?;
        let share_key = scalar_from_canonical(share_bytes)
            .map_err(|err| SignerError::Config(format!("share_key: {err}")))?;

        let group_public = decode_hex32("group_public", &self.group_public)?;
        element_from_bytes(group_public)
            .map_err(|err| SignerError::Config(format!("group_public: {err}")))?;

        let rsa_key = RsaPrivateKey::from_pkcs8_pem(&self.rsa_key)
            .map_err(|err| SignerError::Config(format!("rsa_key: {err}")))?;

        let mut peers = Vec::with_capacity(self.peers.len());
        for entry in &self.peers {
            if peers.iter().any(|p: &CosignerPeer| p.id == entry.id) {
                return Err(SignerError::Config(format!(
                    "duplicate peer id {}",
                    entry.id
                )));
            }
            let rsa_public = RsaPublicKey::from_public_key_pem(&entry.rsa_public)
                .map_err(|err| SignerError::Config(format!("peer {}: {err}", entry.id)))?;
            peers.push(CosignerPeer {
                id: entry.id,
                rsa_public,
            });
        }

        Ok(SignerMaterial {
            key: CosignerKey {
                id: self.id,
                share_key,
                group_public,
            },
            rsa_key,
            peers,
        })
    }
}

fn decode_hex32(field: &str, text: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(text)
        .map_err(|err| SignerError::Config(format!("{field}: invalid hex: {err}")))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| SignerError::Config(format!("{field}: expected 32 bytes, got {}", v.len())))
}
