use storyboard_core::error::CoreError;
use storyboard_db::DbError;

/// Errors from the ordered frame store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The create call for a new card failed; the sequence is unchanged.
    #[error("Failed to create card: {source}")]
    Create {
        #[source]
        source: DbError,
    },

    /// Another delete for the same project has not finished yet.
    #[error("A delete is already in progress for project {project_id}")]
    DeleteInProgress { project_id: String },

    #[error(transparent)]
    Persistence(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Errors from a storyboard build pass.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Persistence(#[from] DbError),
}
