//! Shamir secret sharing over the Ed25519 scalar field.
//!
//! Shares are evaluations of a random polynomial `f` of degree
//! `threshold - 1` with `f(0) = secret`, taken at `x = 1..=total`. Any
//! `threshold` shares recombine through Lagrange interpolation at zero;
//! [`lagrange_coefficient`] exposes the per-participant coefficient so a
//! signer can fold it into its own contribution and let the collector
//! recombine by plain addition.

use alloc::vec::Vec;

use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::errors::{CryptoError, CryptoResult};
use crate::SCALAR_LEN;

/// Deal `total` Shamir shares of a 32-byte secret with the given threshold.
///
/// The secret is interpreted as a little-endian integer and reduced mod the
/// group order. Dealing is randomized: two calls on the same secret yield
/// unrelated share vectors, so dealt shares must be retained, not re-dealt.
///
/// # Errors
///
/// `InvalidParameters` if `threshold` is zero or exceeds `total`.
pub fn deal_shares(
    rng: &mut (impl RngCore + CryptoRng),
    secret: &[u8; SCALAR_LEN],
    threshold: u8,
    total: u8,
) -> CryptoResult<Vec<Scalar>> {
    if threshold == 0 || threshold > total {
        return Err(CryptoError::InvalidParameters { threshold, total });
    }

    let mut coefficients = Vec::with_capacity(threshold as usize);
    coefficients.push(Scalar::from_bytes_mod_order(*secret));
    for _ in 1..threshold {
        coefficients.push(Scalar::random(rng));
    }

    let shares = (1..=total)
        .map(|x| evaluate(&coefficients, Scalar::from(x as u64)))
        .collect();

    for c in coefficients.iter_mut() {
        c.zeroize();
    }

    Ok(shares)
}

/// Horner evaluation of the polynomial given by `coefficients` (constant
/// term first) at `x`.
fn evaluate(coefficients: &[Scalar], x: Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, c| acc * x + c)
}

/// Lagrange coefficient at zero for share point `id` within `participants`.
///
/// Multiplying a share `f(id)` by this coefficient and summing over all of
/// `participants` recovers `f(0)`.
///
/// # Errors
///
/// `UnknownParticipant` if `id` is zero or absent from the set;
/// `DuplicateParticipant` if the set repeats an ID or contains zero.
pub fn lagrange_coefficient(id: u8, participants: &[u8]) -> CryptoResult<Scalar> {
    validate_participants(participants)?;
    if id == 0 || !participants.contains(&id) {
        return Err(CryptoError::UnknownParticipant(id));
    }

    let x_i = Scalar::from(id as u64);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for &j in participants {
        if j == id {
            continue;
        }
        let x_j = Scalar::from(j as u64);
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    // Distinct non-zero points make the denominator non-zero.
    Ok(numerator * denominator.invert())
}

/// Recombine a secret from `(id, share)` points via Lagrange interpolation
/// at zero. At least `threshold` points from the original deal are required
/// for the result to equal the dealt secret.
pub fn combine_shares(points: &[(u8, Scalar)]) -> CryptoResult<Scalar> {
    let ids: Vec<u8> = points.iter().map(|(id, _)| *id).collect();
    validate_participants(&ids)?;

    let mut secret = Scalar::ZERO;
    for (id, share) in points {
        secret += lagrange_coefficient(*id, &ids)? * share;
    }
    Ok(secret)
}

fn validate_participants(participants: &[u8]) -> CryptoResult<()> {
    for (i, &id) in participants.iter().enumerate() {
        if id == 0 {
            return Err(CryptoError::UnknownParticipant(0));
        }
        if participants[..i].contains(&id) {
            return Err(CryptoError::DuplicateParticipant(id));
        }
    }
    Ok(())
}
