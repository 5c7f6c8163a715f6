//! In-memory fakes shared by this crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use storyboard_core::card::{Card, CardPatch, NewCard, OrderPatch};
use storyboard_core::error::CoreError;
use storyboard_db::models::project::{CreateProject, Project};
use storyboard_db::DbError;

use crate::persistence::CardPersistence;

#[derive(Default)]
pub struct MemoryPersistence {
    pub cards: Mutex<HashMap<String, Card>>,
    pub projects: Mutex<Vec<Project>>,
    pub order_batches: Mutex<Vec<Vec<OrderPatch>>>,
    pub updates: Mutex<Vec<CardPatch>>,
    pub fail_create: AtomicBool,
    /// When set, creates fail once this many more have succeeded.
    pub creates_left: Mutex<Option<usize>>,
    pub fail_updates: AtomicBool,
    /// Held by a test to stall creates.
    pub create_gate: tokio::sync::Mutex<()>,
    /// Held by a test to stall deletes.
    pub delete_gate: tokio::sync::Mutex<()>,
}

impl MemoryPersistence {
    pub fn seeded(cards: Vec<Card>) -> Self {
        let store = Self::default();
        store
            .cards
            .lock()
            .unwrap()
            .extend(cards.into_iter().map(|c| (c.id.clone(), c)));
        store
    }

    pub fn stored(&self, project_id: &str) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.order_index);
        cards
    }

    pub fn batch_count(&self) -> usize {
        self.order_batches.lock().unwrap().len()
    }
}

fn boom() -> DbError {
    DbError::Core(CoreError::Internal("simulated storage failure".into()))
}

#[async_trait]
impl CardPersistence for MemoryPersistence {
    async fn load_cards(&self, project_id: &str) -> Result<Vec<Card>, DbError> {
        Ok(self.stored(project_id))
    }

    async fn create_card(&self, card: &Card) -> Result<Card, DbError> {
        let _gate = self.create_gate.lock().await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(boom());
        }
        if let Some(left) = self.creates_left.lock().unwrap().as_mut() {
            if *left == 0 {
                return Err(boom());
            }
            *left -= 1;
        }
        self.cards
            .lock()
            .unwrap()
            .insert(card.id.clone(), card.clone());
        Ok(card.clone())
    }

    async fn delete_card(&self, card_id: &str) -> Result<Option<Card>, DbError> {
        let _gate = self.delete_gate.lock().await;
        Ok(self.cards.lock().unwrap().remove(card_id))
    }

    async fn update_card(&self, patch: &CardPatch) -> Result<Option<Card>, DbError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(boom());
        }
        self.updates.lock().unwrap().push(patch.clone());
        let mut cards = self.cards.lock().unwrap();
        Ok(cards.get_mut(&patch.id).map(|card| {
            card.apply_patch(patch);
            card.clone()
        }))
    }

    async fn apply_order(&self, _project_id: &str, patches: &[OrderPatch]) -> Result<u64, DbError> {
        self.order_batches.lock().unwrap().push(patches.to_vec());
        let mut cards = self.cards.lock().unwrap();
        let mut written = 0;
        for patch in patches {
            if let Some(card) = cards.get_mut(&patch.id) {
                card.apply_patch(&CardPatch::from(patch));
                written += 1;
            }
        }
        Ok(written)
    }

    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        let now = chrono::Utc::now();
        let project = Project {
            id: input.id.clone(),
            user_id: input.user_id.clone(),
            title: input.title.clone(),
            created_at: now,
            updated_at: now,
        };
        self.projects.lock().unwrap().push(project.clone());
        Ok(project)
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool, DbError> {
        self.cards
            .lock()
            .unwrap()
            .retain(|_, c| c.project_id != project_id);
        let mut projects = self.projects.lock().unwrap();
        let before = projects.len();
        projects.retain(|p| p.id != project_id);
        Ok(projects.len() < before)
    }
}

/// A card for `project_id` with the given ordering fields.
pub fn card(project_id: &str, id: &str, order_index: i32) -> Card {
    let mut c = Card::from_draft(
        id.into(),
        project_id.into(),
        "user-1".into(),
        NewCard {
            title: id.to_uppercase(),
            ..Default::default()
        },
        chrono::Utc::now(),
    );
    c.order_index = order_index;
    c
}
