//! Repository for the `cards` table.
//!
//! Writes are schema-tolerant: each statement is built from the columns the
//! live table actually has (see [`SchemaCache`]). Optional columns the table
//! lacks are skipped with a one-time warning; a missing required column is a
//! configuration error raised before anything is sent.

use std::collections::HashSet;

use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use storyboard_core::card::{Card, CardPatch, OrderPatch};
use storyboard_core::error::CoreError;
use storyboard_core::schema::{plan_columns, CARDS_TABLE};

use crate::error::DbError;
use crate::models::card::{card_from_row, card_values, patch_values, ColumnValue};
use crate::schema_cache::SchemaCache;

/// Provides CRUD operations for cards.
pub struct CardRepo;

impl CardRepo {
    /// Insert a card, returning the stored row.
    pub async fn create(pool: &PgPool, schema: &SchemaCache, card: &Card) -> Result<Card, DbError> {
        let columns = schema.columns(pool, CARDS_TABLE).await?;
        let values = card_values(card);
        let names: Vec<&'static str> = values.iter().map(|(c, _)| *c).collect();
        let plan = plan_columns(CARDS_TABLE, &names, &columns)?;
        schema.warn_missing(CARDS_TABLE, &plan.dropped);

        let kept: Vec<(&str, ColumnValue)> = values
            .into_iter()
            .filter(|(c, _)| plan.kept.contains(c))
            .collect();

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO cards (");
        let column_list: Vec<String> = kept.iter().map(|(c, _)| format!("\"{c}\"")).collect();
        qb.push(column_list.join(", "));
        qb.push(") VALUES (");
        for (i, (_, value)) in kept.into_iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            value.push_bind(&mut qb);
        }
        qb.push(") RETURNING *");

        let row = qb.build().fetch_one(pool).await?;
        Ok(card_from_row(&row)?)
    }

    /// Find a card by id.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Card>, DbError> {
        let row = sqlx::query("SELECT * FROM cards WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| card_from_row(&r)).transpose()?)
    }

    /// List a project's cards in stored order.
    ///
    /// Ties on `order_index` are broken by creation time then id so that
    /// the result is deterministic even before a repair reindex.
    pub async fn list_for_project(pool: &PgPool, project_id: &str) -> Result<Vec<Card>, DbError> {
        let rows = sqlx::query(
            "SELECT * FROM cards
             WHERE project_id = $1
             ORDER BY order_index ASC, created_at ASC, id ASC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;
        rows.iter()
            .map(|r| card_from_row(r).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update. Returns `None` if no card has that id.
    pub async fn update(
        pool: &PgPool,
        schema: &SchemaCache,
        patch: &CardPatch,
    ) -> Result<Option<Card>, DbError> {
        let columns = schema.columns(pool, CARDS_TABLE).await?;
        Self::update_in(pool, &columns, schema, None, patch).await
    }

    /// Apply every patch inside one transaction.
    ///
    /// All-or-nothing: a failure on any record, including an id that does
    /// not belong to the project, rolls back the whole batch.
    pub async fn batch_update(
        pool: &PgPool,
        schema: &SchemaCache,
        project_id: &str,
        patches: &[CardPatch],
    ) -> Result<Vec<Card>, DbError> {
        if patches.is_empty() {
            return Ok(Vec::new());
        }
        let columns = schema.columns(pool, CARDS_TABLE).await?;

        let mut tx = pool.begin().await?;
        let mut updated = Vec::with_capacity(patches.len());
        for patch in patches {
            match Self::update_in(&mut *tx, &columns, schema, Some(project_id), patch).await? {
                Some(card) => updated.push(card),
                None => {
                    return Err(CoreError::NotFound {
                        entity: "card",
                        id: patch.id.clone(),
                    }
                    .into());
                }
            }
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Persist ordering fields for a set of cards in one transaction.
    ///
    /// Rows deleted since the batch was computed are skipped. Returns the
    /// number of rows written.
    pub async fn apply_order(
        pool: &PgPool,
        schema: &SchemaCache,
        project_id: &str,
        patches: &[OrderPatch],
    ) -> Result<u64, DbError> {
        if patches.is_empty() {
            return Ok(0);
        }
        let columns = schema.columns(pool, CARDS_TABLE).await?;

        let mut tx = pool.begin().await?;
        let mut written = 0;
        for order in patches {
            let patch = CardPatch::from(order);
            if Self::update_in(&mut *tx, &columns, schema, Some(project_id), &patch)
                .await?
                .is_some()
            {
                written += 1;
            }
        }
        tx.commit().await?;
        Ok(written)
    }

    /// Delete a card, returning the removed row (for asset cleanup).
    pub async fn delete(pool: &PgPool, id: &str) -> Result<Option<Card>, DbError> {
        let row = sqlx::query("DELETE FROM cards WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|r| card_from_row(&r)).transpose()?)
    }

    async fn update_in<'e, E>(
        exec: E,
        columns: &HashSet<String>,
        schema: &SchemaCache,
        project_id: Option<&str>,
        patch: &CardPatch,
    ) -> Result<Option<Card>, DbError>
    where
        E: PgExecutor<'e>,
    {
        let values = patch_values(patch);
        let names: Vec<&'static str> = values.iter().map(|(c, _)| *c).collect();
        let plan = plan_columns(CARDS_TABLE, &names, columns)?;
        schema.warn_missing(CARDS_TABLE, &plan.dropped);

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE cards SET \"updated_at\" = NOW()");
        for (column, value) in values {
            if plan.kept.contains(&column) {
                qb.push(format!(", \"{column}\" = "));
                value.push_bind(&mut qb);
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(patch.id.clone());
        if let Some(project_id) = project_id {
            qb.push(" AND project_id = ");
            qb.push_bind(project_id.to_string());
        }
        qb.push(" RETURNING *");

        let row = qb.build().fetch_optional(exec).await?;
        Ok(row.map(|r| card_from_row(&r)).transpose()?)
    }
}
