//! Ordered frame store and storyboard build pass.
//!
//! - [`frame_store`] -- per-project in-memory card sequence with ordered,
//!   fire-and-forget ordering writes through [`write_queue`].
//! - [`build`] -- script to stored frames, background inheritance and
//!   image generation published to a live session.
//! - [`persistence`] -- the storage seam both sit on.

pub mod build;
pub mod builder;
pub mod error;
pub mod frame_store;
pub mod persistence;
pub mod write_queue;

#[cfg(test)]
mod testing;

pub use build::{BuildStarted, StoryboardPipeline, StoryboardRequest};
pub use builder::{ScriptStoryboardBuilder, StoryboardBuilder, StoryboardDraft};
pub use error::{PipelineError, StoreError};
pub use frame_store::FrameStore;
pub use persistence::{CardPersistence, PgCardPersistence};
pub use write_queue::{WriteQueue, WriteTicket};
