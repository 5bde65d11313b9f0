//! # vigil-crypto-core
//!
//! Ed25519 threshold-signing primitives for the vigil cosigner.
//!
//! A quorum of cosigners holds Shamir shares of a single Ed25519 signing
//! key. Each round the participants deal fresh Shamir shares of an
//! ephemeral nonce to one another, and every participant produces a partial
//! signature from its key share and its aggregated nonce share. The partial
//! signatures of the active subset sum to a standard Ed25519 signature.
//!
//! ## Modules
//!
//! - [`curve`]: scalar/element arithmetic and strict decoding
//! - [`shamir`]: share dealing, Lagrange coefficients, recombination
//! - [`sign`]: partial signatures, fragment combination, verification
//! - [`errors`]: error types
//!
//! ## Security Considerations
//!
//! All scalar and point arithmetic on secret values goes through
//! `curve25519-dalek` and is constant-time. Polynomial coefficients and
//! dealt secrets are zeroized after use. Callers provide the RNG; it must
//! be cryptographically secure.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod curve;
pub mod errors;
pub mod shamir;
pub mod sign;

pub use curve::{
    add_elements, add_scalars, element_from_bytes, scalar_from_canonical, scalar_multiply_base,
};
pub use errors::{CryptoError, CryptoResult};
pub use shamir::{combine_shares, deal_shares, lagrange_coefficient};
pub use sign::{combine_signature_fragments, sign_with_share, verify_signature};

/// Byte length of an encoded Ed25519 scalar or curve element.
pub const SCALAR_LEN: usize = 32;

/// Byte length of a signature or signature fragment (`R ‖ s`).
pub const SIGNATURE_LEN: usize = 64;
