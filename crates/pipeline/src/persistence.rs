//! Storage seam used by the frame store and the build pass.
//!
//! [`PgCardPersistence`] forwards to the schema-tolerant repositories; tests
//! substitute in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use storyboard_core::card::{Card, CardPatch, OrderPatch};
use storyboard_db::models::project::{CreateProject, Project};
use storyboard_db::repositories::{CardRepo, ProjectRepo};
use storyboard_db::{DbError, SchemaCache};

#[async_trait]
pub trait CardPersistence: Send + Sync {
    /// A project's cards in stored order.
    async fn load_cards(&self, project_id: &str) -> Result<Vec<Card>, DbError>;

    async fn create_card(&self, card: &Card) -> Result<Card, DbError>;

    /// Returns the removed row, or `None` if it did not exist.
    async fn delete_card(&self, card_id: &str) -> Result<Option<Card>, DbError>;

    async fn update_card(&self, patch: &CardPatch) -> Result<Option<Card>, DbError>;

    /// Write ordering fields in one transaction; returns rows written.
    async fn apply_order(&self, project_id: &str, patches: &[OrderPatch]) -> Result<u64, DbError>;

    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError>;

    /// Remove a project together with its cards.
    async fn delete_project(&self, project_id: &str) -> Result<bool, DbError>;
}

/// PostgreSQL-backed persistence.
#[derive(Clone)]
pub struct PgCardPersistence {
    pool: PgPool,
    schema: Arc<SchemaCache>,
}

impl PgCardPersistence {
    pub fn new(pool: PgPool, schema: Arc<SchemaCache>) -> Self {
        Self { pool, schema }
    }
}

#[async_trait]
impl CardPersistence for PgCardPersistence {
    async fn load_cards(&self, project_id: &str) -> Result<Vec<Card>, DbError> {
        CardRepo::list_for_project(&self.pool, project_id).await
    }

    async fn create_card(&self, card: &Card) -> Result<Card, DbError> {
        CardRepo::create(&self.pool, &self.schema, card).await
    }

    async fn delete_card(&self, card_id: &str) -> Result<Option<Card>, DbError> {
        CardRepo::delete(&self.pool, card_id).await
    }

    async fn update_card(&self, patch: &CardPatch) -> Result<Option<Card>, DbError> {
        CardRepo::update(&self.pool, &self.schema, patch).await
    }

    async fn apply_order(&self, project_id: &str, patches: &[OrderPatch]) -> Result<u64, DbError> {
        CardRepo::apply_order(&self.pool, &self.schema, project_id, patches).await
    }

    async fn create_project(&self, input: &CreateProject) -> Result<Project, DbError> {
        Ok(ProjectRepo::create(&self.pool, input).await?)
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool, DbError> {
        Ok(ProjectRepo::delete(&self.pool, project_id).await?)
    }
}
