//! Request extractors.
//!
//! - [`auth::AuthUser`] -- the authenticated user from a JWT bearer token.

pub mod auth;
