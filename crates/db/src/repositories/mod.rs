//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod card_repo;
pub mod project_repo;

pub use card_repo::CardRepo;
pub use project_repo::ProjectRepo;
