//! Image generation collaborator.
//!
//! The build pipeline only needs "prompt in, image URL out". The
//! [`ImageGenerator`] trait is that seam; [`api::HttpImageGenerator`] talks
//! to an HTTP image service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod api;

pub use api::{HttpImageGenerator, ImageGenError};

/// A single image to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: None,
        }
    }
}

/// A rendered image as reported by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedImage {
    pub image_url: String,
    /// Object-storage key, when the service stored the image itself.
    #[serde(default)]
    pub image_key: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

/// Produces an image for a prompt.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImageGenError>;
}
