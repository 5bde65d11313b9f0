//! The canonical block-vote schema behind sign bytes.
//!
//! Sign requests carry the serialized vote a validator wants signed. The
//! engine never interprets the payload beyond what double-sign protection
//! needs: the consensus coordinates (height, round, step), the timestamp,
//! and field-for-field equality of everything else.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::{Result, SignerError};

/// Consensus step of a block proposal.
pub const STEP_PROPOSE: u8 = 1;
/// Consensus step of a prevote.
pub const STEP_PREVOTE: u8 = 2;
/// Consensus step of a precommit.
pub const STEP_PRECOMMIT: u8 = 3;

/// Height/Round/Step coordinates of a vote.
///
/// Orders lexicographically; this is the order double-sign monotonicity is
/// defined over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct HrsKey {
    /// Block height.
    pub height: i64,
    /// Consensus round within the height.
    pub round: i64,
    /// Consensus step within the round.
    pub step: u8,
}

impl fmt::Display for HrsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.height, self.round, self.step)
    }
}

/// HRS coordinates plus the vote timestamp, keying per-round ephemeral
/// state. The timestamp tags a concrete sign-bytes variant; it does not
/// participate in monotonicity, so no ordering is defined here. Compare
/// through [`HrstKey::hrs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HrstKey {
    /// Block height.
    pub height: i64,
    /// Consensus round within the height.
    pub round: i64,
    /// Consensus step within the round.
    pub step: u8,
    /// Vote timestamp, nanoseconds since the epoch.
    pub timestamp: i64,
}

impl HrstKey {
    /// Project away the timestamp.
    pub fn hrs(&self) -> HrsKey {
        HrsKey {
            height: self.height,
            round: self.round,
            step: self.step,
        }
    }
}

impl fmt::Display for HrstKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.height, self.round, self.step, self.timestamp
        )
    }
}

/// A block vote in its canonical form.
///
/// Serialization is canonical JSON: fields in declaration order, byte
/// fields as lowercase hex. Two encodings of equal votes are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Vote type; doubles as the consensus step (propose/prevote/precommit).
    pub vote_type: u8,
    /// Block height.
    pub height: i64,
    /// Consensus round within the height.
    pub round: i64,
    /// Hash of the proposed block; empty for nil votes.
    #[serde(with = "encoding::hex_vec")]
    pub block_id: Vec<u8>,
    /// Vote timestamp, nanoseconds since the epoch.
    pub timestamp: i64,
    /// Chain this vote belongs to.
    pub chain_id: String,
}

impl Vote {
    /// Canonical sign-bytes encoding of this vote.
    pub fn sign_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a vote from its sign bytes.
    pub fn decode(sign_bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(sign_bytes)?)
    }

    /// The HRST coordinates of this vote.
    pub fn hrst_key(&self) -> Result<HrstKey> {
        match self.vote_type {
            STEP_PROPOSE | STEP_PREVOTE | STEP_PRECOMMIT => Ok(HrstKey {
                height: self.height,
                round: self.round,
                step: self.vote_type,
                timestamp: self.timestamp,
            }),
            other => Err(SignerError::InvalidVoteType(other)),
        }
    }

    /// Whether `other` is the same vote up to its timestamp.
    pub fn eq_ignoring_timestamp(&self, other: &Vote) -> bool {
        self.vote_type == other.vote_type
            && self.height == other.height
            && self.round == other.round
            && self.block_id == other.block_id
            && self.chain_id == other.chain_id
    }
}

/// Decode sign bytes and extract their HRST coordinates.
pub fn unpack_hrst(sign_bytes: &[u8]) -> Result<HrstKey> {
    Vote::decode(sign_bytes)?.hrst_key()
}
