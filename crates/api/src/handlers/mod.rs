pub mod cards;
pub mod storyboards;

use storyboard_core::error::CoreError;
use storyboard_db::models::project::Project;
use storyboard_db::repositories::ProjectRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Load a project and check that `user_id` owns it.
pub(crate) async fn owned_project(
    state: &AppState,
    project_id: &str,
    user_id: &str,
) -> AppResult<Project> {
    let project = ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Project",
                id: project_id.to_string(),
            })
        })?;
    if project.user_id != user_id {
        return Err(AppError::Core(CoreError::Forbidden(
            "Project belongs to another user".into(),
        )));
    }
    Ok(project)
}
