//! # fhirgate-auth
//!
//! The gateway's view of "who is calling": decoded token claims turned into
//! a [`Principal`], and the [`SyncStrategy`] an application configuration
//! can select.
//!
//! JWT *signature* verification is explicitly out of scope — it is assumed
//! to have happened upstream (an API gateway, a sidecar, or the identity
//! provider's own edge). This crate only decodes the claims payload so the
//! rest of the pipeline has something to read; see
//! [`claims::decode_unverified_claims`] for the exact boundary.

pub mod claims;
pub mod principal;
pub mod strategy;

pub use claims::DecodedClaims;
pub use principal::Principal;
pub use strategy::SyncStrategy;
