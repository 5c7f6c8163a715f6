//! Ordered frame store: the authoritative in-memory card sequence per
//! project.
//!
//! Every mutation is applied to the sequence first and returned to the
//! caller immediately; the ordering fields it changed are pushed to the
//! [`WriteQueue`] and persisted in the background, in mutation order.
//!
//! The per-project lock is only held while the sequence is being spliced,
//! never across a storage call. Concurrent inserts and reorders for one
//! project are therefore not serialized against each other beyond that:
//! each leaves the sequence dense and linked, but an insert position is
//! re-clamped against whatever the sequence looks like when the create call
//! returns. Deletes are serialized by an in-flight flag.
//!
//! An operation resolves its project entry once and keeps it. Eviction only
//! empties the entry's slot, so a mutation that finds the slot empty after
//! its storage call reloads the sequence instead of starting a new one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use storyboard_cloud::AssetStore;
use storyboard_core::card::{Card, NewCard};
use storyboard_core::error::CoreError;
use storyboard_core::ordering::{
    all_order_patches, insert_at, move_card, order_patches, place_for_insert, remove_by_id,
    reindex, sort_loaded,
};
use storyboard_core::types::new_entity_id;
use tokio::sync::MappedMutexGuard;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::persistence::CardPersistence;
use crate::write_queue::WriteQueue;

/// Sequences untouched for this long are dropped from memory.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(600);

struct ProjectFrames {
    /// `None` until loaded from storage, and again after an eviction.
    cards: tokio::sync::Mutex<Option<Vec<Card>>>,
    deleting: AtomicBool,
    last_used: Mutex<Instant>,
}

impl ProjectFrames {
    fn new() -> Self {
        Self {
            cards: tokio::sync::Mutex::new(None),
            deleting: AtomicBool::new(false),
            last_used: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }
}

/// Clears the in-flight delete flag when dropped.
struct DeleteGuard<'a>(&'a AtomicBool);

impl Drop for DeleteGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FrameStore {
    persistence: Arc<dyn CardPersistence>,
    queue: Arc<WriteQueue>,
    assets: Arc<dyn AssetStore>,
    projects: Mutex<HashMap<String, Arc<ProjectFrames>>>,
}

impl FrameStore {
    pub fn new(
        persistence: Arc<dyn CardPersistence>,
        queue: Arc<WriteQueue>,
        assets: Arc<dyn AssetStore>,
    ) -> Self {
        Self {
            persistence,
            queue,
            assets,
            projects: Mutex::new(HashMap::new()),
        }
    }

    pub fn queue(&self) -> &Arc<WriteQueue> {
        &self.queue
    }

    /// Number of projects with an entry in memory.
    pub fn cached_projects(&self) -> usize {
        self.projects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn project(&self, project_id: &str) -> Arc<ProjectFrames> {
        let mut projects = self.projects.lock().unwrap_or_else(|e| e.into_inner());
        let frames = projects
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(ProjectFrames::new()));
        frames.touch();
        Arc::clone(frames)
    }

    fn existing(&self, project_id: &str) -> Option<Arc<ProjectFrames>> {
        self.projects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(project_id)
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// The project's sequence, loading it from storage on first use.
    ///
    /// Stored rows with gaps, duplicates or stale links are normalized in
    /// memory and the repair is queued like any other ordering batch.
    pub async fn load(&self, project_id: &str) -> Result<Vec<Card>, StoreError> {
        let frames = self.project(project_id);
        let cards = self.loaded(project_id, &frames).await?;
        Ok(cards.to_vec())
    }

    /// Lock `frames` with its sequence present, reading storage if the slot
    /// is empty. The lock is not held during the read.
    async fn loaded<'a>(
        &self,
        project_id: &str,
        frames: &'a ProjectFrames,
    ) -> Result<MappedMutexGuard<'a, Vec<Card>>, StoreError> {
        let slot = frames.cards.lock().await;
        if slot.is_none() {
            drop(slot);
            let mut loaded = self.persistence.load_cards(project_id).await?;
            let mut slot = frames.cards.lock().await;
            if slot.is_none() {
                sort_loaded(&mut loaded);
                let repaired = reindex(&mut loaded);
                if !repaired.is_empty() {
                    tracing::info!(project_id, repaired = repaired.len(), "Repairing stored card order");
                    self.queue
                        .enqueue(project_id, order_patches(&loaded, &repaired));
                }
                *slot = Some(loaded);
            }
            return Ok(tokio::sync::MutexGuard::map(slot, |s| s.get_or_insert_with(Vec::new)));
        }
        Ok(tokio::sync::MutexGuard::map(slot, |s| s.get_or_insert_with(Vec::new)))
    }

    /// Seed the sequence, e.g. with the cards a build pass just created.
    pub async fn replace(&self, project_id: &str, mut cards: Vec<Card>) {
        sort_loaded(&mut cards);
        *self.project(project_id).cards.lock().await = Some(cards);
    }

    /// Drop the cached sequence so the next access reloads from storage.
    ///
    /// The project entry itself stays, along with its in-flight delete flag.
    pub async fn evict(&self, project_id: &str) {
        if let Some(frames) = self.existing(project_id) {
            *frames.cards.lock().await = None;
        }
    }

    /// Drop entries untouched for `max_idle` that no operation is using
    /// and whose ordering writes have all been applied. Returns how many
    /// were dropped.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut projects = self.projects.lock().unwrap_or_else(|e| e.into_inner());
        let before = projects.len();
        projects.retain(|project_id, frames| {
            Arc::strong_count(frames) > 1
                || frames.idle_for() < max_idle
                || self.queue.has_worker(project_id)
        });
        before - projects.len()
    }

    /// Periodically run [`evict_idle`](Self::evict_idle) until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        max_idle: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(max_idle.max(Duration::from_secs(1)));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let dropped = store.evict_idle(max_idle);
                        if dropped > 0 {
                            tracing::debug!(dropped, "Dropped idle card sequences");
                        }
                    }
                }
            }
        })
    }

    /// Overwrite a cached card's content in place, keeping its position.
    ///
    /// Used when a card changes outside the ordering operations (status and
    /// image updates during generation). Unknown ids are ignored.
    pub async fn refresh_card(&self, card: &Card) {
        let Some(frames) = self.existing(&card.project_id) else {
            return;
        };
        let mut slot = frames.cards.lock().await;
        if let Some(existing) = slot
            .as_mut()
            .and_then(|cards| cards.iter_mut().find(|c| c.id == card.id))
        {
            let (order_index, scene_number) = (existing.order_index, existing.scene_number);
            let (prev, next) = (existing.prev_card_id.take(), existing.next_card_id.take());
            *existing = card.clone();
            existing.order_index = order_index;
            existing.scene_number = scene_number;
            existing.prev_card_id = prev;
            existing.next_card_id = next;
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a card and splice it in at `index` (append when `None`).
    ///
    /// The card is persisted before it joins the sequence. If the create
    /// call fails, nothing changes and [`StoreError::Create`] is returned.
    pub async fn insert(
        &self,
        project_id: &str,
        user_id: &str,
        draft: NewCard,
        index: Option<usize>,
    ) -> Result<Vec<Card>, StoreError> {
        let frames = self.project(project_id);
        let current = self.loaded(project_id, &frames).await?.to_vec();
        let index = index.unwrap_or(current.len());
        if index > current.len() {
            return Err(CoreError::Validation(format!(
                "insert index {index} out of range for {} cards",
                current.len()
            ))
            .into());
        }

        let mut card = Card::from_draft(
            new_entity_id(),
            project_id.to_string(),
            user_id.to_string(),
            draft,
            chrono::Utc::now(),
        );
        place_for_insert(&current, index, &mut card);

        let created = self
            .persistence
            .create_card(&card)
            .await
            .map_err(|source| StoreError::Create { source })?;

        let mut cards = self.loaded(project_id, &frames).await?;
        // A reload after an eviction already contains the new row.
        cards.retain(|c| c.id != created.id);
        let index = index.min(cards.len());
        let changed = insert_at(&mut cards, index, created)?;
        let patches = order_patches(&cards, &changed);
        let snapshot = cards.to_vec();
        drop(cards);

        tracing::info!(project_id, index, card_count = snapshot.len(), "Card inserted");
        self.queue.enqueue(project_id, patches);
        Ok(snapshot)
    }

    /// Delete a card and return the reindexed sequence.
    ///
    /// Rejected with [`StoreError::DeleteInProgress`] while another delete
    /// for the same project is running. The row delete is awaited; the
    /// asset delete and the ordering batch are not.
    pub async fn delete(&self, project_id: &str, card_id: &str) -> Result<Vec<Card>, StoreError> {
        let frames = self.project(project_id);
        if frames.deleting.swap(true, Ordering::AcqRel) {
            return Err(StoreError::DeleteInProgress {
                project_id: project_id.to_string(),
            });
        }
        let _guard = DeleteGuard(&frames.deleting);

        let known = self
            .loaded(project_id, &frames)
            .await?
            .iter()
            .any(|c| c.id == card_id);
        if !known {
            return Err(CoreError::NotFound {
                entity: "card",
                id: card_id.to_string(),
            }
            .into());
        }

        let deleted = self.persistence.delete_card(card_id).await?;

        // After an eviction the reload no longer has the row, and its repair
        // batch already covers the gap.
        let mut cards = self.loaded(project_id, &frames).await?;
        let removed = remove_by_id(&mut cards, card_id);
        let snapshot = cards.to_vec();
        drop(cards);
        let patches = removed
            .as_ref()
            .map(|(_, changed)| order_patches(&snapshot, changed))
            .unwrap_or_default();

        let image_key = deleted
            .and_then(|row| row.image_key)
            .or_else(|| removed.and_then(|(card, _)| card.image_key));
        if let Some(key) = image_key {
            self.spawn_asset_delete(key);
        }

        tracing::info!(project_id, card_id, card_count = snapshot.len(), "Card deleted");
        self.queue.enqueue(project_id, patches);
        Ok(snapshot)
    }

    /// Move the card at `from` to `to`. A no-op when they are equal.
    pub async fn reorder(&self, project_id: &str, from: usize, to: usize) -> Result<Vec<Card>, StoreError> {
        let frames = self.project(project_id);
        let mut cards = self.loaded(project_id, &frames).await?;
        if !move_card(&mut cards, from, to)? {
            return Ok(cards.to_vec());
        }
        let patches = all_order_patches(&cards);
        let snapshot = cards.to_vec();
        drop(cards);

        tracing::info!(project_id, from, to, "Cards reordered");
        self.queue.enqueue(project_id, patches);
        Ok(snapshot)
    }

    fn spawn_asset_delete(&self, key: String) {
        let assets = Arc::clone(&self.assets);
        tokio::spawn(async move {
            if let Err(e) = assets.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete stored image");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
