//! Script → scene drafts.

use async_trait::async_trait;
use storyboard_core::error::CoreError;
use storyboard_core::script::{split_scenes, SceneDraft};

/// The initial frame set of a storyboard, before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryboardDraft {
    pub title: String,
    pub frames: Vec<SceneDraft>,
}

/// Produces the initial frame set from a (title-stripped) script body.
#[async_trait]
pub trait StoryboardBuilder: Send + Sync {
    async fn create_storyboard(&self, title: &str, body: &str) -> Result<StoryboardDraft, CoreError>;
}

/// Splits the script at scene headings, or at blank lines when it has none.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptStoryboardBuilder;

#[async_trait]
impl StoryboardBuilder for ScriptStoryboardBuilder {
    async fn create_storyboard(&self, title: &str, body: &str) -> Result<StoryboardDraft, CoreError> {
        let frames = split_scenes(body);
        if frames.is_empty() {
            return Err(CoreError::Validation("script contains no scenes".into()));
        }
        Ok(StoryboardDraft {
            title: title.to_string(),
            frames,
        })
    }
}
