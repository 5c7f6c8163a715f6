use storyboard_core::error::CoreError;

/// Errors from the persistence layer.
///
/// Query failures carry the underlying sqlx error; schema problems found
/// before a statement is issued surface as [`CoreError::Configuration`].
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Query(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DbError {
    /// Whether this error is a missing-row condition.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DbError::Query(sqlx::Error::RowNotFound) | DbError::Core(CoreError::NotFound { .. })
        )
    }
}
