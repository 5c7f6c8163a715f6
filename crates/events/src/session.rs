//! Live build session.
//!
//! A [`BuildSession`] holds the current frames of an in-flight build and a
//! broadcast channel of [`SessionUpdate`]s. State changes and broadcasts
//! happen under one lock, and [`subscribe`](BuildSession::subscribe) takes
//! its snapshot under the same lock, so a subscriber never misses or
//! double-counts an update that raced with its subscription.

use std::sync::Mutex;
use std::time::Instant;

use storyboard_core::card::Card;
use storyboard_core::types::EntityId;
use tokio::sync::broadcast;

/// Default buffer capacity for a session's broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// An incremental change published to live subscribers.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// A frame was added or changed.
    Frame(Card),
    /// The build finished; no further updates follow.
    Complete,
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub storyboard_id: EntityId,
    pub title: String,
    /// Frames sorted by `order_index`.
    pub frames: Vec<Card>,
    pub complete: bool,
}

#[derive(Debug)]
struct SessionState {
    title: String,
    frames: Vec<Card>,
    completed_at: Option<Instant>,
}

/// In-process record of one storyboard build.
pub struct BuildSession {
    storyboard_id: EntityId,
    sender: broadcast::Sender<SessionUpdate>,
    state: Mutex<SessionState>,
}

impl BuildSession {
    pub fn new(storyboard_id: impl Into<EntityId>, title: impl Into<String>, frames: Vec<Card>) -> Self {
        Self::with_capacity(storyboard_id, title, frames, DEFAULT_CAPACITY)
    }

    /// Create a session with a specific channel capacity.
    ///
    /// Subscribers that fall more than `capacity` updates behind observe a
    /// lag and are resynchronised from the current state.
    pub fn with_capacity(
        storyboard_id: impl Into<EntityId>,
        title: impl Into<String>,
        mut frames: Vec<Card>,
        capacity: usize,
    ) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        frames.sort_by_key(|c| c.order_index);
        Self {
            storyboard_id: storyboard_id.into(),
            sender,
            state: Mutex::new(SessionState {
                title: title.into(),
                frames,
                completed_at: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.storyboard_id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot_of(&self, state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            storyboard_id: self.storyboard_id.clone(),
            title: state.title.clone(),
            frames: state.frames.clone(),
            complete: state.completed_at.is_some(),
        }
    }

    /// Record a frame change and publish it.
    ///
    /// Updates after completion are ignored.
    pub fn update_frame(&self, card: Card) {
        let mut state = self.lock();
        if state.completed_at.is_some() {
            tracing::debug!(storyboard_id = %self.storyboard_id, card_id = %card.id, "Ignoring update after completion");
            return;
        }
        match state.frames.iter_mut().find(|c| c.id == card.id) {
            Some(existing) => *existing = card.clone(),
            None => {
                state.frames.push(card.clone());
                state.frames.sort_by_key(|c| c.order_index);
            }
        }
        // A send error only means nobody is listening.
        let _ = self.sender.send(SessionUpdate::Frame(card));
    }

    /// Mark the build complete and notify subscribers. Idempotent.
    pub fn complete(&self) {
        let mut state = self.lock();
        if state.completed_at.is_some() {
            return;
        }
        state.completed_at = Some(Instant::now());
        let _ = self.sender.send(SessionUpdate::Complete);
    }

    pub fn is_complete(&self) -> bool {
        self.lock().completed_at.is_some()
    }

    pub fn completed_at(&self) -> Option<Instant> {
        self.lock().completed_at
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    /// Current state plus a receiver for every update after it.
    pub fn subscribe(&self) -> (SessionSnapshot, broadcast::Receiver<SessionUpdate>) {
        let state = self.lock();
        let rx = self.sender.subscribe();
        (self.snapshot_of(&state), rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for BuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSession")
            .field("storyboard_id", &self.storyboard_id)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
