//! Core identity types for ssogate.
//!
//! This crate provides the canonical claim record produced by every identity
//! provider adapter, the claim-key vocabulary used by access filters, and the
//! shared `Result` alias.

pub mod claims;
pub mod error;

pub use claims::{Assurance, Claims, RawClaims, key};
pub use error::Result;
