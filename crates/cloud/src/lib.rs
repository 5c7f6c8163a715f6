//! Object storage for generated assets.
//!
//! Only deletion is consumed by the service: removing a card removes its
//! stored image. [`AssetStore`] is the seam; [`r2::R2AssetStore`] targets
//! Cloudflare R2 through the S3 API, and [`DisabledAssetStore`] stands in
//! when no bucket is configured.

use async_trait::async_trait;

pub mod r2;

pub use r2::{R2AssetStore, R2Config};

/// Errors from the object storage layer.
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    #[error("Storage request failed: {0}")]
    Request(String),
}

/// Deletes stored objects by key.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn delete(&self, key: &str) -> Result<(), CloudError>;
}

/// Store used when no bucket is configured. Deletes are logged no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAssetStore;

#[async_trait]
impl AssetStore for DisabledAssetStore {
    async fn delete(&self, key: &str) -> Result<(), CloudError> {
        tracing::debug!(key, "Asset store disabled; skipping delete");
        Ok(())
    }
}
