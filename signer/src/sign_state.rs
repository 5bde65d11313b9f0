//! Durable last-signed record.
//!
//! The sign state is the engine's double-sign protection: at most one
//! fully-signed record exists, its coordinates only ever move forward, and
//! the record must be durable on disk before the matching signature is
//! released to peers. Writes are atomic (temp file, fsync, rename, fsync
//! of the directory); after a crash the last durable record wins.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::encoding;
use crate::error::{Result, SignerError};
use crate::vote::{HrsKey, HrstKey, Vote};

/// The last fully-signed record of this cosigner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignStateConsensus {
    /// Block height of the signed vote.
    pub height: i64,
    /// Consensus round of the signed vote.
    pub round: i64,
    /// Consensus step of the signed vote.
    pub step: u8,
    /// The emitted signature fragment (`R ‖ s`).
    #[serde(with = "encoding::hex_array")]
    pub signature: [u8; 64],
    /// The exact sign bytes the fragment covers.
    #[serde(with = "encoding::hex_vec")]
    pub sign_bytes: Vec<u8>,
    /// Aggregated ephemeral public point of the round.
    #[serde(with = "encoding::hex_array")]
    pub ephemeral_public: [u8; 32],
}

impl SignStateConsensus {
    /// A fresh record at coordinates 0/0/0, preceding every real vote.
    pub fn empty() -> Self {
        SignStateConsensus {
            height: 0,
            round: 0,
            step: 0,
            signature: [0u8; 64],
            sign_bytes: Vec::new(),
            ephemeral_public: [0u8; 32],
        }
    }

    /// The HRS coordinates of this record.
    pub fn hrs_key(&self) -> HrsKey {
        HrsKey {
            height: self.height,
            round: self.round,
            step: self.step,
        }
    }
}

/// Durable sign state backed by a single fsync'd file.
#[derive(Debug)]
pub struct SignState {
    consensus: SignStateConsensus,
    path: PathBuf,
}

impl SignState {
    /// Recover the sign state from `path`, or initialize a fresh one there.
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            let raw = fs::read(&path)?;
            let consensus: SignStateConsensus = serde_json::from_slice(&raw)?;
            info!(
                path = %path.display(),
                coordinates = %consensus.hrs_key(),
                "🗄️ recovered sign state"
            );
            return Ok(SignState { consensus, path });
        }

        let state = SignState {
            consensus: SignStateConsensus::empty(),
            path,
        };
        state.persist()?;
        info!(path = %state.path.display(), "🗄️ initialized fresh sign state");
        Ok(state)
    }

    /// The current record.
    pub fn consensus(&self) -> &SignStateConsensus {
        &self.consensus
    }

    /// Compare request coordinates against the persisted record.
    ///
    /// Returns `true` for identical HRS, `false` for strictly greater, and
    /// refuses strictly lower coordinates as a regression.
    pub fn check_hrs(&self, hrst: &HrstKey) -> Result<bool> {
        let current = self.consensus.hrs_key();
        let requested = hrst.hrs();
        if requested < current {
            warn!(%current, %requested, "❌ refusing sign request below last signed coordinates");
            return Err(SignerError::Regression { current, requested });
        }
        Ok(requested == current)
    }

    /// Require that `candidate` differs from the persisted sign bytes only
    /// in its timestamp field.
    pub fn only_differ_by_timestamp(&self, candidate: &[u8]) -> Result<()> {
        let held = Vote::decode(&self.consensus.sign_bytes)?;
        let offered = Vote::decode(candidate)?;
        if held.eq_ignoring_timestamp(&offered) {
            Ok(())
        } else {
            warn!(
                coordinates = %self.consensus.hrs_key(),
                "❌ conflicting sign bytes at signed coordinates"
            );
            Err(SignerError::ConflictingData)
        }
    }

    /// Atomically replace the record with `record` and make it durable.
    ///
    /// A record at the current coordinates with identical sign bytes yields
    /// the `SameHrs` sentinel and leaves the file untouched; a record at
    /// lower coordinates is a regression.
    pub fn save(&mut self, record: SignStateConsensus) -> Result<()> {
        let current = self.consensus.hrs_key();
        let requested = record.hrs_key();
        if requested < current {
            return Err(SignerError::Regression { current, requested });
        }
        if requested == current && record.sign_bytes == self.consensus.sign_bytes {
            return Err(SignerError::SameHrs);
        }

        self.consensus = record;
        self.persist()?;
        debug!(coordinates = %requested, "✅ sign state advanced");
        Ok(())
    }

    /// Write-temp, fsync, rename, fsync-directory.
    fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&serde_json::to_vec_pretty(&self.consensus)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        sync_parent_dir(&self.path)?;
        Ok(())
    }
}

fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}
