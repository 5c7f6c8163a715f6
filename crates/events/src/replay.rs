//! Subscribe-and-replay over a live session or a persisted snapshot.
//!
//! [`StreamSource`] is the single entry point for serving a storyboard
//! stream. Both variants produce the same event grammar:
//!
//! ```text
//! init  frame*  complete  end
//! ```
//!
//! A snapshot never has `frame` events and never waits. A live source ends
//! when its session completes; nothing is emitted after `complete` except
//! `end`. Dropping the returned stream drops the broadcast receiver.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::PgPool;
use storyboard_core::card::Card;
use storyboard_core::frame_cache::FrameCache;
use storyboard_core::types::EntityId;
use storyboard_db::repositories::{CardRepo, ProjectRepo};
use storyboard_db::DbError;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::event::{StreamEvent, StreamStatus};
use crate::registry::SessionRegistry;
use crate::session::{BuildSession, SessionSnapshot, SessionUpdate};

// ---------------------------------------------------------------------------
// Persisted snapshots
// ---------------------------------------------------------------------------

/// A storyboard reconstructed from stored rows.
#[derive(Debug, Clone)]
pub struct PersistedSnapshot {
    pub storyboard_id: EntityId,
    pub title: String,
    /// Frames in stored order.
    pub frames: Vec<Card>,
}

/// Reads a storyboard back from storage when no live session exists.
#[async_trait]
pub trait SnapshotLoader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// `None` when nothing is stored under `storyboard_id`.
    async fn load_snapshot(
        &self,
        storyboard_id: &str,
    ) -> Result<Option<PersistedSnapshot>, Self::Error>;
}

#[async_trait]
impl SnapshotLoader for PgPool {
    type Error = DbError;

    async fn load_snapshot(
        &self,
        storyboard_id: &str,
    ) -> Result<Option<PersistedSnapshot>, DbError> {
        let Some(project) = ProjectRepo::find_by_id(self, storyboard_id).await? else {
            return Ok(None);
        };
        let frames = CardRepo::list_for_project(self, storyboard_id).await?;
        Ok(Some(PersistedSnapshot {
            storyboard_id: project.id,
            title: project.title,
            frames,
        }))
    }
}

// ---------------------------------------------------------------------------
// StreamSource
// ---------------------------------------------------------------------------

/// Where a stream's events come from.
#[derive(Debug)]
pub enum StreamSource {
    Live(Arc<BuildSession>),
    Snapshot(PersistedSnapshot),
}

impl StreamSource {
    /// Subscribe (for a live source) and return the event stream.
    ///
    /// The live subscription is taken before this returns, so updates
    /// published afterwards are never missed.
    pub fn into_events(self) -> BoxStream<'static, StreamEvent> {
        match self {
            Self::Live(session) => {
                let replay = LiveReplay::start(session);
                stream::unfold(replay, |mut replay| async move {
                    replay.next_event().await.map(|event| (event, replay))
                })
                .boxed()
            }
            Self::Snapshot(snapshot) => stream::iter(snapshot_events(snapshot)).boxed(),
        }
    }
}

/// Prefer a live session; fall back to stored rows; `None` if neither exists.
pub async fn resolve_source<L>(
    registry: &SessionRegistry,
    loader: &L,
    storyboard_id: &str,
) -> Result<Option<StreamSource>, L::Error>
where
    L: SnapshotLoader + ?Sized,
{
    if let Some(session) = registry.get(storyboard_id).await {
        return Ok(Some(StreamSource::Live(session)));
    }
    let snapshot = loader.load_snapshot(storyboard_id).await?;
    Ok(snapshot.map(StreamSource::Snapshot))
}

fn snapshot_events(snapshot: PersistedSnapshot) -> Vec<StreamEvent> {
    let mut cache = FrameCache::new();
    let frames = cache.views(&snapshot.frames);
    let id = &snapshot.storyboard_id;
    vec![
        StreamEvent::init(id, StreamStatus::Complete, &snapshot.title, frames.clone()),
        StreamEvent::complete(id, &snapshot.title, frames),
        StreamEvent::end(id),
    ]
}

// ---------------------------------------------------------------------------
// Live replay
// ---------------------------------------------------------------------------

struct LiveReplay {
    session: Arc<BuildSession>,
    rx: broadcast::Receiver<SessionUpdate>,
    cache: FrameCache,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl LiveReplay {
    fn start(session: Arc<BuildSession>) -> Self {
        let (snapshot, rx) = session.subscribe();
        let mut replay = Self {
            session,
            rx,
            cache: FrameCache::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        let status = if snapshot.complete {
            StreamStatus::Complete
        } else {
            StreamStatus::Generating
        };
        let frames = replay.cache.views(&snapshot.frames);
        replay
            .pending
            .push_back(StreamEvent::init(&snapshot.storyboard_id, status, &snapshot.title, frames));
        if snapshot.complete {
            replay.finish(&snapshot);
        }
        replay
    }

    fn finish(&mut self, snapshot: &SessionSnapshot) {
        let frames = self.cache.views(&snapshot.frames);
        let id = &snapshot.storyboard_id;
        self.pending
            .push_back(StreamEvent::complete(id, &snapshot.title, frames));
        self.pending.push_back(StreamEvent::end(id));
        self.finished = true;
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            match self.rx.recv().await {
                Ok(SessionUpdate::Frame(card)) => {
                    let view = self.cache.view(&card);
                    self.pending
                        .push_back(StreamEvent::frame(self.session.id(), view));
                }
                Ok(SessionUpdate::Complete) | Err(RecvError::Closed) => {
                    let snapshot = self.session.snapshot();
                    self.finish(&snapshot);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        storyboard_id = %self.session.id(),
                        skipped,
                        "Stream subscriber lagged; resending current frames"
                    );
                    let snapshot = self.session.snapshot();
                    for card in &snapshot.frames {
                        let view = self.cache.view(card);
                        self.pending
                            .push_back(StreamEvent::frame(self.session.id(), view));
                    }
                    if snapshot.complete {
                        self.finish(&snapshot);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::time::Duration;

    use storyboard_core::card::NewCard;

    use super::*;
    use crate::event::StreamEventKind;

    fn card(id: &str, order_index: i32) -> Card {
        let mut c = Card::from_draft(
            id.into(),
            "sb".into(),
            "u1".into(),
            NewCard {
                title: id.into(),
                ..Default::default()
            },
            chrono::Utc::now(),
        );
        c.order_index = order_index;
        c
    }

    async fn collect(source: StreamSource) -> Vec<StreamEvent> {
        tokio::time::timeout(Duration::from_secs(5), source.into_events().collect())
            .await
            .expect("stream should close on its own")
    }

    fn kinds(events: &[StreamEvent]) -> Vec<StreamEventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    struct FakeLoader(Option<PersistedSnapshot>);

    #[async_trait]
    impl SnapshotLoader for FakeLoader {
        type Error = Infallible;

        async fn load_snapshot(&self, _id: &str) -> Result<Option<PersistedSnapshot>, Infallible> {
            Ok(self.0.clone())
        }
    }

    fn stored() -> PersistedSnapshot {
        PersistedSnapshot {
            storyboard_id: "sb".into(),
            title: "Dawn".into(),
            frames: vec![card("a", 0), card("b", 1)],
        }
    }

    // -- snapshot --------------------------------------------------------------

    #[tokio::test]
    async fn snapshot_emits_init_complete_end() {
        let events = collect(StreamSource::Snapshot(stored())).await;
        use StreamEventKind::*;
        assert_eq!(kinds(&events), [Init, Complete, End]);
        assert_eq!(events[0].payload.frames.as_ref().unwrap().len(), 2);
        assert_eq!(events[0].payload.status, StreamStatus::Complete);
    }

    // -- live ------------------------------------------------------------------

    #[tokio::test]
    async fn live_orders_init_frames_complete_end() {
        let session = Arc::new(BuildSession::new("sb", "Dawn", vec![card("a", 0)]));
        let stream = StreamSource::Live(Arc::clone(&session)).into_events();

        let mut updated = card("a", 0);
        updated.image_url = Some("https://img/a.png".into());
        session.update_frame(updated);
        session.update_frame(card("b", 1));
        session.complete();
        session.update_frame(card("c", 2));

        let events: Vec<StreamEvent> =
            tokio::time::timeout(Duration::from_secs(5), stream.collect())
                .await
                .unwrap();
        use StreamEventKind::*;
        assert_eq!(kinds(&events), [Init, Frame, Frame, Complete, End]);
        assert_eq!(events[0].payload.status, StreamStatus::Generating);
        assert_eq!(
            events[1].payload.frame.as_ref().unwrap().image_url.as_deref(),
            Some("https://img/a.png")
        );
        assert_eq!(events[3].payload.frames.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn live_after_completion_replays_without_waiting() {
        let session = Arc::new(BuildSession::new("sb", "Dawn", vec![card("a", 0)]));
        session.complete();
        let events = collect(StreamSource::Live(session)).await;
        use StreamEventKind::*;
        assert_eq!(kinds(&events), [Init, Complete, End]);
    }

    #[tokio::test]
    async fn lagging_subscriber_is_resynchronised() {
        let session = Arc::new(BuildSession::with_capacity(
            "sb",
            "Dawn",
            vec![card("a", 0), card("b", 1)],
            2,
        ));
        let stream = StreamSource::Live(Arc::clone(&session)).into_events();

        session.update_frame(card("a", 0));
        session.update_frame(card("b", 1));
        session.update_frame(card("a", 0));
        session.complete();

        let events: Vec<StreamEvent> =
            tokio::time::timeout(Duration::from_secs(5), stream.collect())
                .await
                .unwrap();
        use StreamEventKind::*;
        assert_eq!(kinds(&events), [Init, Frame, Frame, Complete, End]);
    }

    #[tokio::test]
    async fn dropping_stream_releases_subscription() {
        let session = Arc::new(BuildSession::new("sb", "Dawn", Vec::new()));
        let mut stream = StreamSource::Live(Arc::clone(&session)).into_events();
        assert_eq!(session.subscriber_count(), 1);

        let first = stream.next().await.unwrap();
        assert_eq!(first.kind, StreamEventKind::Init);
        drop(stream);
        assert_eq!(session.subscriber_count(), 0);
    }

    // -- resolve_source --------------------------------------------------------

    #[tokio::test]
    async fn resolve_prefers_live_session() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        registry.register(BuildSession::new("sb", "Live", Vec::new())).await;
        let source = resolve_source(&registry, &FakeLoader(Some(stored())), "sb")
            .await
            .unwrap();
        assert!(matches!(source, Some(StreamSource::Live(_))));
    }

    #[tokio::test]
    async fn resolve_falls_back_to_snapshot() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let source = resolve_source(&registry, &FakeLoader(Some(stored())), "sb")
            .await
            .unwrap();
        assert!(matches!(source, Some(StreamSource::Snapshot(_))));
    }

    #[tokio::test]
    async fn resolve_reports_not_found() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let source = resolve_source(&registry, &FakeLoader(None), "sb").await.unwrap();
        assert!(source.is_none());
    }
}
