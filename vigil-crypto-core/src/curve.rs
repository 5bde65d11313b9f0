//! Ed25519 scalar and curve-element helpers.
//!
//! Thin wrappers over `curve25519-dalek` giving the cosigner the handful of
//! operations it needs: sums of scalars and elements, base-point
//! multiplication, and strict decoding of untrusted 32-byte values.

use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;

use crate::errors::{CryptoError, CryptoResult};
use crate::SCALAR_LEN;

/// Sum a slice of scalars mod the group order.
pub fn add_scalars(parts: &[Scalar]) -> Scalar {
    parts.iter().fold(Scalar::ZERO, |acc, s| acc + s)
}

/// Sum a slice of curve elements.
pub fn add_elements(parts: &[EdwardsPoint]) -> EdwardsPoint {
    parts.iter().fold(EdwardsPoint::identity(), |acc, p| acc + p)
}

/// Multiply the Ed25519 base point by `scalar`.
pub fn scalar_multiply_base(scalar: &Scalar) -> EdwardsPoint {
    scalar * ED25519_BASEPOINT_TABLE
}

/// Decode a canonical scalar, rejecting values `>= ℓ`.
///
/// The comparison against the group order is constant-time.
pub fn scalar_from_canonical(bytes: [u8; SCALAR_LEN]) -> CryptoResult<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or(CryptoError::ScalarOutOfRange)
}

/// Decompress a curve element from its 32-byte encoding.
pub fn element_from_bytes(bytes: [u8; SCALAR_LEN]) -> CryptoResult<EdwardsPoint> {
    CompressedEdwardsY(bytes)
        .decompress()
        .ok_or(CryptoError::InvalidElement)
}
