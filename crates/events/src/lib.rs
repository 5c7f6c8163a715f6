//! Storyboard build progress streaming.
//!
//! - [`BuildSession`] -- live, in-process record of one build pass with a
//!   `tokio::sync::broadcast` fan-out for frame updates.
//! - [`SessionRegistry`] -- the sessions currently held in memory, evicted a
//!   retention period after completion.
//! - [`StreamSource`] -- one replay interface over either a live session or a
//!   snapshot read back from the database.
//! - [`StreamEvent`] -- the named `init` / `frame` / `complete` / `end`
//!   events a client receives.

pub mod event;
pub mod registry;
pub mod replay;
pub mod session;

pub use event::{StreamEvent, StreamEventKind, StreamStatus};
pub use registry::SessionRegistry;
pub use replay::{resolve_source, PersistedSnapshot, SnapshotLoader, StreamSource};
pub use session::{BuildSession, SessionSnapshot, SessionUpdate};
