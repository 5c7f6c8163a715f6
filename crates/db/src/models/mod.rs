//! Domain model structs and DTOs.
//!
//! - [`project`] -- `FromRow` entity plus create DTO.
//! - [`card`] -- tolerant row decoding and column/value lists for writes;
//!   the entity itself lives in `storyboard_core::card`.

pub mod card;
pub mod project;
