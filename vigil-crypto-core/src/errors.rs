//! Error types for the threshold-signing primitives.

use core::fmt;

/// Result type alias for threshold-signing operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors produced by the dealing, signing, and combination primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Threshold/total pair is unusable (zero, or threshold > total).
    InvalidParameters {
        /// Requested threshold.
        threshold: u8,
        /// Total number of shares.
        total: u8,
    },

    /// A 32-byte value is not a canonical scalar (not reduced mod the group
    /// order).
    ScalarOutOfRange,

    /// A 32-byte value does not decompress to a curve element.
    InvalidElement,

    /// An input has the wrong byte length.
    InvalidLength {
        /// Which input.
        field: &'static str,
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// A participant ID is zero or missing from the participant set.
    UnknownParticipant(u8),

    /// A participant ID appears more than once in the participant set.
    DuplicateParticipant(u8),

    /// No signature fragments were supplied to the combiner.
    NoFragments,

    /// Signature fragments disagree on the ephemeral public point.
    FragmentMismatch,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidParameters { threshold, total } => {
                write!(f, "invalid sharing parameters: {threshold}-of-{total}")
            }
            CryptoError::ScalarOutOfRange => {
                write!(f, "scalar is not canonically reduced")
            }
            CryptoError::InvalidElement => {
                write!(f, "bytes do not encode a curve element")
            }
            CryptoError::InvalidLength {
                field,
                expected,
                actual,
            } => {
                write!(f, "invalid {field} length: expected {expected}, got {actual}")
            }
            CryptoError::UnknownParticipant(id) => {
                write!(f, "participant {id} is not in the signing set")
            }
            CryptoError::DuplicateParticipant(id) => {
                write!(f, "participant {id} appears twice in the signing set")
            }
            CryptoError::NoFragments => {
                write!(f, "no signature fragments to combine")
            }
            CryptoError::FragmentMismatch => {
                write!(f, "signature fragments carry different ephemeral points")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}
