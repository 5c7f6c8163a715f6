//! Domain core for the storyboard frame service.
//!
//! Everything in this crate is pure: no I/O, no async. The database,
//! pipeline and API crates build on these types and algorithms.

pub mod card;
pub mod error;
pub mod frame_cache;
pub mod inheritance;
pub mod ordering;
pub mod schema;
pub mod script;
pub mod types;
