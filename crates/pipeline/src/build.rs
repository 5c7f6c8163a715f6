//! Storyboard build pass.
//!
//! A build turns a script into a stored project with one card per scene,
//! then renders an image for each card in the background while publishing
//! every status change to a live [`BuildSession`].
//!
//! Background inheritance is decided as a fold over the scenes in order;
//! the decision is collapsed into each card's `background` field and later
//! into its image prompt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use storyboard_core::card::{Card, CardPatch, NewCard, StoryboardStatus};
use storyboard_core::error::CoreError;
use storyboard_core::inheritance::decide_all;
use storyboard_core::ordering::reindex;
use storyboard_core::script::{extract_title, strip_title};
use storyboard_core::types::{new_entity_id, EntityId};
use storyboard_db::models::project::CreateProject;
use storyboard_db::DbError;
use storyboard_events::{BuildSession, SessionRegistry};
use storyboard_imagegen::{ImageGenerator, ImageRequest};

use crate::builder::StoryboardBuilder;
use crate::error::PipelineError;
use crate::frame_store::FrameStore;
use crate::persistence::CardPersistence;

/// Title used when neither the request nor the script names one.
pub const DEFAULT_TITLE: &str = "Untitled Storyboard";

fn default_true() -> bool {
    true
}

/// Input for a new storyboard build.
#[derive(Debug, Clone, Deserialize)]
pub struct StoryboardRequest {
    pub script: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_true")]
    pub generate_images: bool,
}

/// Returned once the storyboard is stored and its session is live.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStarted {
    pub storyboard_id: EntityId,
    pub title: String,
    pub frame_count: usize,
}

/// Explicit title, else the script's title line, else [`DEFAULT_TITLE`].
pub fn resolve_title(explicit: Option<&str>, script: &str) -> String {
    explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| extract_title(script))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Image prompt for a card, from its shot metadata and background.
pub fn compose_prompt(card: &Card) -> String {
    let mut parts = vec!["Storyboard frame".to_string()];
    if let Some(shot) = card.shot_type.as_deref().filter(|s| !s.is_empty()) {
        parts.push(shot.to_string());
    }
    let action = card
        .shot_description
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&card.content);
    if !action.trim().is_empty() {
        parts.push(action.trim().to_string());
    }
    if let Some(background) = card.background.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Setting: {background}"));
    }
    parts.join(". ")
}

pub struct StoryboardPipeline {
    persistence: Arc<dyn CardPersistence>,
    store: Arc<FrameStore>,
    registry: Arc<SessionRegistry>,
    builder: Arc<dyn StoryboardBuilder>,
    images: Option<Arc<dyn ImageGenerator>>,
}

impl StoryboardPipeline {
    pub fn new(
        persistence: Arc<dyn CardPersistence>,
        store: Arc<FrameStore>,
        registry: Arc<SessionRegistry>,
        builder: Arc<dyn StoryboardBuilder>,
        images: Option<Arc<dyn ImageGenerator>>,
    ) -> Self {
        Self {
            persistence,
            store,
            registry,
            builder,
            images,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Store the storyboard, register its live session and start image
    /// generation in the background.
    pub async fn start(
        &self,
        user_id: &str,
        request: StoryboardRequest,
    ) -> Result<BuildStarted, PipelineError> {
        let images = match (&self.images, request.generate_images) {
            (None, true) => {
                return Err(CoreError::Configuration("image generation is not configured".into()).into())
            }
            (images, true) => images.clone(),
            (_, false) => None,
        };
        if request.script.trim().is_empty() {
            return Err(CoreError::Validation("script must not be empty".into()).into());
        }

        let title = resolve_title(request.title.as_deref(), &request.script);
        let body = strip_title(&request.script);
        let draft = self.builder.create_storyboard(&title, &body).await?;

        let decisions = decide_all(draft.frames.iter().map(|s| s.description.as_str()));

        let project = self
            .persistence
            .create_project(&CreateProject {
                id: new_entity_id(),
                user_id: user_id.to_string(),
                title: draft.title.clone(),
            })
            .await?;

        let now = chrono::Utc::now();
        let mut cards: Vec<Card> = draft
            .frames
            .into_iter()
            .zip(&decisions)
            .map(|(scene, background)| {
                Card::from_draft(
                    new_entity_id(),
                    project.id.clone(),
                    user_id.to_string(),
                    NewCard {
                        title: scene.heading,
                        content: scene.description,
                        shot_type: scene.shot_type,
                        dialogue: scene.dialogue,
                        background: Some(background.description.clone()),
                        storyboard_status: Some(StoryboardStatus::Pending),
                        ..Default::default()
                    },
                    now,
                )
            })
            .collect();
        reindex(&mut cards);

        let stored = match self.create_cards(&cards).await {
            Ok(stored) => stored,
            Err(e) => {
                // A partial storyboard would be served as a complete snapshot.
                if let Err(cleanup) = self.persistence.delete_project(&project.id).await {
                    tracing::warn!(
                        project_id = %project.id,
                        error = %cleanup,
                        "Failed to remove partially stored storyboard"
                    );
                }
                tracing::error!(project_id = %project.id, error = %e, "Storing storyboard frames failed");
                return Err(e.into());
            }
        };

        let inherited = decisions.iter().filter(|d| d.is_inherited).count();
        tracing::info!(
            project_id = %project.id,
            frame_count = stored.len(),
            inherited,
            "Storyboard stored"
        );

        self.store.replace(&project.id, stored.clone()).await;
        let session = self
            .registry
            .register(BuildSession::new(project.id.clone(), draft.title.clone(), stored.clone()))
            .await;

        let started = BuildStarted {
            storyboard_id: project.id,
            title: draft.title,
            frame_count: stored.len(),
        };

        match images {
            Some(images) => {
                let run = GenerationRun {
                    persistence: Arc::clone(&self.persistence),
                    store: Arc::clone(&self.store),
                    registry: Arc::clone(&self.registry),
                    images,
                    session,
                };
                tokio::spawn(run.execute(stored));
            }
            None => self.registry.finish(session),
        }

        Ok(started)
    }

    async fn create_cards(&self, cards: &[Card]) -> Result<Vec<Card>, DbError> {
        let mut stored = Vec::with_capacity(cards.len());
        for card in cards {
            stored.push(self.persistence.create_card(card).await?);
        }
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Image generation
// ---------------------------------------------------------------------------

struct GenerationRun {
    persistence: Arc<dyn CardPersistence>,
    store: Arc<FrameStore>,
    registry: Arc<SessionRegistry>,
    images: Arc<dyn ImageGenerator>,
    session: Arc<BuildSession>,
}

impl GenerationRun {
    async fn execute(self, cards: Vec<Card>) {
        let mut ready = 0;
        for card in cards {
            if self.generate_one(card).await == StoryboardStatus::Ready {
                ready += 1;
            }
        }
        tracing::info!(storyboard_id = %self.session.id(), ready, "Storyboard generation finished");
        self.registry.finish(Arc::clone(&self.session));
    }

    /// Drive one card to `ready` or `error`. Never fails the batch.
    async fn generate_one(&self, mut card: Card) -> StoryboardStatus {
        let patch = CardPatch::for_id(&card.id);
        self.advance(&mut card, StoryboardStatus::Enhancing, patch).await;

        let prompt = compose_prompt(&card);
        let mut patch = CardPatch::for_id(&card.id);
        patch.image_prompt = Some(Some(prompt.clone()));
        self.advance(&mut card, StoryboardStatus::Prompted, patch).await;

        let patch = CardPatch::for_id(&card.id);
        self.advance(&mut card, StoryboardStatus::Generating, patch).await;

        let mut patch = CardPatch::for_id(&card.id);
        let status = match self.images.generate(&ImageRequest::new(prompt)).await {
            Ok(image) => {
                patch.image_url = Some(Some(image.image_url.clone()));
                patch.image_urls = Some(vec![image.image_url]);
                patch.selected_image_url = Some(Some(0));
                patch.image_key = Some(image.image_key);
                patch.image_size = Some(image.size);
                patch.image_type = Some(image.content_type);
                StoryboardStatus::Ready
            }
            Err(e) => {
                tracing::warn!(card_id = %card.id, error = %e, "Image generation failed");
                StoryboardStatus::Error
            }
        };
        self.advance(&mut card, status, patch).await;
        status
    }

    async fn advance(&self, card: &mut Card, status: StoryboardStatus, mut patch: CardPatch) {
        let from = card.storyboard_status.unwrap_or(StoryboardStatus::Pending);
        if !from.can_transition_to(status) {
            tracing::warn!(card_id = %card.id, %from, to = %status, "Unexpected status transition");
        }

        patch.storyboard_status = Some(Some(status));
        card.apply_patch(&patch);
        card.updated_at = chrono::Utc::now();

        if let Err(e) = self.persistence.update_card(&patch).await {
            tracing::warn!(card_id = %card.id, status = %status, error = %e, "Failed to persist frame status");
        }
        self.store.refresh_card(card).await;
        self.session.update_frame(card.clone());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
