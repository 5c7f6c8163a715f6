use std::sync::Arc;
use std::time::Duration;

use storyboard_cloud::AssetStore;
use storyboard_db::SchemaCache;
use storyboard_events::SessionRegistry;
use storyboard_imagegen::ImageGenerator;
use storyboard_pipeline::{
    CardPersistence, FrameStore, PgCardPersistence, ScriptStoryboardBuilder, StoryboardPipeline,
    WriteQueue,
};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: storyboard_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Live column sets of the tables written schema-tolerantly.
    pub schema: Arc<SchemaCache>,
    /// Authoritative in-memory card sequences.
    pub frames: Arc<FrameStore>,
    /// Live build sessions by storyboard id.
    pub sessions: Arc<SessionRegistry>,
    /// Storyboard build pass.
    pub pipeline: Arc<StoryboardPipeline>,
}

impl AppState {
    /// Wire the stores and the build pass over `pool`.
    ///
    /// `cancel` stops the idle-sequence sweeper and the ordering write
    /// workers, the latter once their queued batches are applied.
    pub fn new(
        pool: storyboard_db::DbPool,
        config: ServerConfig,
        images: Option<Arc<dyn ImageGenerator>>,
        assets: Arc<dyn AssetStore>,
        cancel: CancellationToken,
    ) -> Self {
        let schema = Arc::new(SchemaCache::new());
        let persistence: Arc<dyn CardPersistence> =
            Arc::new(PgCardPersistence::new(pool.clone(), Arc::clone(&schema)));

        let queue = Arc::new(
            WriteQueue::new(Arc::clone(&persistence), cancel.clone())
                .with_idle_timeout(Duration::from_secs(config.write_idle_secs)),
        );
        let frames = Arc::new(FrameStore::new(Arc::clone(&persistence), queue, assets));
        frames.spawn_sweeper(Duration::from_secs(config.frame_idle_secs), cancel);
        let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(
            config.session_retention_secs,
        )));
        let pipeline = Arc::new(StoryboardPipeline::new(
            persistence,
            Arc::clone(&frames),
            Arc::clone(&sessions),
            Arc::new(ScriptStoryboardBuilder),
            images,
        ));

        Self {
            pool,
            config: Arc::new(config),
            schema,
            frames,
            sessions,
            pipeline,
        }
    }
}
