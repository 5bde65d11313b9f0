//! Error types for the cosigner engine.

use thiserror::Error;

use crate::vote::HrsKey;
use vigil_crypto_core::CryptoError;

/// Result type alias for cosigner operations.
pub type Result<T> = std::result::Result<T, SignerError>;

/// Errors surfaced by the cosigner engine and its sign state.
///
/// `Regression` and `ConflictingData` are hard failures: they indicate a
/// double-sign risk and must never be retried. `SameHrs` is a sentinel the
/// sign path treats as success.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Requested coordinates are strictly below the last signed record.
    #[error("sign request regression: last signed {current}, requested {requested}")]
    Regression {
        /// Coordinates of the persisted record.
        current: HrsKey,
        /// Coordinates of the refused request.
        requested: HrsKey,
    },

    /// Same coordinates, but the sign bytes differ beyond the timestamp.
    #[error("conflicting sign bytes at already-signed coordinates")]
    ConflictingData,

    /// Same coordinates and identical sign bytes; nothing to persist.
    #[error("sign state unchanged at current coordinates")]
    SameHrs,

    /// `sign` was called before any shares were dealt for the coordinates.
    #[error("no metadata for {0}")]
    NoMetadataForHrs(HrsKey),

    /// The aggregated ephemeral share is not a canonical scalar.
    #[error("ephemeral share is out of bounds")]
    EphemeralShareOutOfBounds,

    /// Fewer peer slots are populated than the signing threshold requires.
    #[error("insufficient ephemeral shares: got {got}, need {need}")]
    InsufficientShares {
        /// Populated peer slots.
        got: usize,
        /// Configured threshold.
        need: u8,
    },

    /// The peer ID is not part of the configured cosigner set.
    #[error("unknown cosigner: {0}")]
    UnknownPeer(u8),

    /// RSA-PSS verification of a peer envelope failed.
    #[error("peer envelope signature verification failed")]
    PeerAuth,

    /// A peer envelope arrived without a source signature.
    #[error("source signature field is required")]
    MissingSignature,

    /// The operation is not available on this cosigner variant.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    /// Sign bytes decoded, but the vote type maps to no consensus step.
    #[error("unknown vote type: {0}")]
    InvalidVoteType(u8),

    /// Invalid key material or peer configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failure inside a threshold-signing primitive.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Failure inside an RSA primitive.
    #[error("rsa failure: {0}")]
    Rsa(#[from] rsa::Error),

    /// A payload failed to encode or decode.
    #[error("codec failure: {0}")]
    Codec(#[from] serde_json::Error),

    /// Sign-state file I/O failed.
    #[error("sign state i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
