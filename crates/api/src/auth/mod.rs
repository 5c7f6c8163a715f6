//! Authentication primitives.
//!
//! - [`jwt`] -- validation of bearer tokens issued by the external auth
//!   provider.

pub mod jwt;
