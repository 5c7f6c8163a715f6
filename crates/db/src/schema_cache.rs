//! Live column introspection with a process-lifetime cache.
//!
//! Tables can lag behind the application's field set during a rolling
//! migration. Writers ask the [`SchemaCache`] which columns a table actually
//! has before building a statement. The first lookup per table hits
//! `information_schema`; later lookups are served from memory until the
//! process restarts (schema changes ship with a deploy).
//!
//! The cache is an ordinary value held in application state, so tests can
//! build a fresh one or [`reset`](SchemaCache::reset) it between cases.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use storyboard_core::error::CoreError;
use tokio::sync::RwLock;

use crate::error::DbError;

/// Something that can report the column names of a table.
#[async_trait]
pub trait ColumnSource: Send + Sync {
    /// Column names of `table`. An empty set means the table does not exist.
    async fn load_columns(&self, table: &str) -> Result<HashSet<String>, sqlx::Error>;
}

#[async_trait]
impl ColumnSource for PgPool {
    async fn load_columns(&self, table: &str) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT column_name::text
             FROM information_schema.columns
             WHERE table_schema = current_schema()
               AND table_name = $1",
        )
        .bind(table)
        .fetch_all(self)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

/// Cached column sets plus the record of which missing columns have
/// already been reported.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: RwLock<HashMap<String, Arc<HashSet<String>>>>,
    warned: Mutex<HashSet<(String, String)>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column set of `table`, introspected on first use.
    ///
    /// A table with no columns at all is reported as a configuration error.
    pub async fn columns(
        &self,
        source: &dyn ColumnSource,
        table: &str,
    ) -> Result<Arc<HashSet<String>>, DbError> {
        if let Some(cols) = self.tables.read().await.get(table) {
            return Ok(Arc::clone(cols));
        }

        let mut tables = self.tables.write().await;
        if let Some(cols) = tables.get(table) {
            return Ok(Arc::clone(cols));
        }

        let cols = source.load_columns(table).await?;
        if cols.is_empty() {
            return Err(CoreError::Configuration(format!("table '{table}' does not exist")).into());
        }
        tracing::info!(table, column_count = cols.len(), "Cached table schema");

        let cols = Arc::new(cols);
        tables.insert(table.to_string(), Arc::clone(&cols));
        Ok(cols)
    }

    /// Log a warning for each dropped column not reported before.
    ///
    /// Returns how many warnings were emitted by this call.
    pub fn warn_missing(&self, table: &str, dropped: &[&str]) -> usize {
        if dropped.is_empty() {
            return 0;
        }
        let mut warned = self.warned.lock().unwrap_or_else(|e| e.into_inner());
        let mut emitted = 0;
        for &column in dropped {
            if warned.insert((table.to_string(), column.to_string())) {
                tracing::warn!(
                    table,
                    column,
                    "Column missing from live schema; omitting it from writes"
                );
                emitted += 1;
            }
        }
        emitted
    }

    /// Number of distinct (table, column) pairs reported so far.
    pub fn warned_count(&self) -> usize {
        self.warned.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Every reported missing column as `table.column`, sorted.
    pub fn missing_columns(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .warned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(table, column)| format!("{table}.{column}"))
            .collect();
        missing.sort();
        missing
    }

    /// Forget every cached schema and warning.
    pub async fn reset(&self) {
        self.tables.write().await.clear();
        self.warned.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
