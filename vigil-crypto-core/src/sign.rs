//! Partial Ed25519 signatures and their combination.
//!
//! A signature fragment is `R ‖ s_i` where `R` is the round's aggregated
//! ephemeral public point and `s_i = e_i + c·a_i` for the signer's
//! (coefficient-scaled) ephemeral share `e_i` and signing share `a_i`, with
//! the standard challenge `c = SHA-512(R ‖ A ‖ M) mod ℓ`. Fragments from
//! the active subset sum to a signature that verifies under RFC 8032.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha512};

use crate::curve::{element_from_bytes, scalar_from_canonical};
use crate::errors::{CryptoError, CryptoResult};
use crate::{SCALAR_LEN, SIGNATURE_LEN};

/// Compute the Ed25519 challenge scalar `SHA-512(R ‖ A ‖ M) mod ℓ`.
fn challenge(
    ephemeral_public: &[u8; SCALAR_LEN],
    group_public: &[u8; SCALAR_LEN],
    message: &[u8],
) -> Scalar {
    let mut hash = Sha512::new();
    hash.update(ephemeral_public);
    hash.update(group_public);
    hash.update(message);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(hash.finalize().as_slice());
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Produce a signature fragment over `message`.
///
/// `ephemeral_share` must be exactly 32 bytes and canonically reduced;
/// anything else is refused before touching the signing share.
pub fn sign_with_share(
    message: &[u8],
    signing_share: &Scalar,
    ephemeral_share: &[u8],
    group_public: &[u8; SCALAR_LEN],
    ephemeral_public: &[u8; SCALAR_LEN],
) -> CryptoResult<[u8; SIGNATURE_LEN]> {
    let share_bytes: [u8; SCALAR_LEN] =
        ephemeral_share
            .try_into()
            .map_err(|_| CryptoError::InvalidLength {
                field: "ephemeral share",
                expected: SCALAR_LEN,
                actual: ephemeral_share.len(),
            })?;
    let ephemeral = scalar_from_canonical(share_bytes)?;

    let c = challenge(ephemeral_public, group_public, message);
    let s = ephemeral + c * signing_share;

    let mut fragment = [0u8; SIGNATURE_LEN];
    fragment[..SCALAR_LEN].copy_from_slice(ephemeral_public);
    fragment[SCALAR_LEN..].copy_from_slice(&s.to_bytes());
    Ok(fragment)
}

/// Sum signature fragments into a full signature.
///
/// Every fragment must carry the same ephemeral point `R`; the `s` halves
/// are added mod ℓ. The result verifies only if the fragments came from a
/// full signing subset.
pub fn combine_signature_fragments(
    fragments: &[[u8; SIGNATURE_LEN]],
) -> CryptoResult<[u8; SIGNATURE_LEN]> {
    let first = fragments.first().ok_or(CryptoError::NoFragments)?;
    let ephemeral_public = &first[..SCALAR_LEN];

    let mut s = Scalar::ZERO;
    for fragment in fragments {
        if &fragment[..SCALAR_LEN] != ephemeral_public {
            return Err(CryptoError::FragmentMismatch);
        }
        let half: [u8; SCALAR_LEN] = fragment[SCALAR_LEN..].try_into().expect("fragment layout");
        s += scalar_from_canonical(half)?;
    }

    let mut signature = [0u8; SIGNATURE_LEN];
    signature[..SCALAR_LEN].copy_from_slice(ephemeral_public);
    signature[SCALAR_LEN..].copy_from_slice(&s.to_bytes());
    Ok(signature)
}

/// Verify an Ed25519 signature against a 32-byte public key.
///
/// Checks `s·B = R + c·A` with a canonical `s`; returns `false` on any
/// malformed input rather than erroring, since the inputs are untrusted.
pub fn verify_signature(
    message: &[u8],
    public_key: &[u8; SCALAR_LEN],
    signature: &[u8; SIGNATURE_LEN],
) -> bool {
    let r_bytes: [u8; SCALAR_LEN] = signature[..SCALAR_LEN].try_into().expect("signature layout");
    let s_bytes: [u8; SCALAR_LEN] = signature[SCALAR_LEN..].try_into().expect("signature layout");

    let (a, s) = match (element_from_bytes(*public_key), scalar_from_canonical(s_bytes)) {
        (Ok(a), Ok(s)) => (a, s),
        _ => return false,
    };

    let c = challenge(&r_bytes, public_key, message);
    // R' = s·B - c·A; the signature is valid iff R' encodes to R.
    let r = EdwardsPoint::vartime_double_scalar_mul_basepoint(&-c, &a, &s);
    r.compress().to_bytes() == r_bytes
}
