//! Cloudflare R2 asset store over the S3 API.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;

use crate::{AssetStore, CloudError};

/// R2 always uses the `auto` region.
const R2_REGION: &str = "auto";

/// Connection settings for an R2 bucket.
#[derive(Clone)]
pub struct R2Config {
    /// Account endpoint, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Config")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl R2Config {
    fn validate(&self) -> Result<(), CloudError> {
        let fields = [
            ("R2_ENDPOINT", &self.endpoint),
            ("R2_BUCKET", &self.bucket),
            ("R2_ACCESS_KEY_ID", &self.access_key_id),
            ("R2_SECRET_ACCESS_KEY", &self.secret_access_key),
        ];
        match fields.iter().find(|(_, v)| v.trim().is_empty()) {
            Some((name, _)) => Err(CloudError::Configuration(format!("{name} is empty"))),
            None => Ok(()),
        }
    }
}

/// Asset store backed by an R2 bucket.
pub struct R2AssetStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl R2AssetStore {
    /// Build a client for the configured bucket. No request is sent.
    pub fn new(config: &R2Config) -> Result<Self, CloudError> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "r2-static",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(R2_REGION))
            .endpoint_url(config.endpoint.trim_end_matches('/'))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl AssetStore for R2AssetStore {
    async fn delete(&self, key: &str) -> Result<(), CloudError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| CloudError::Request(DisplayErrorContext(e).to_string()))?;
        tracing::info!(bucket = %self.bucket, key, "Deleted stored asset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config() -> R2Config {
        R2Config {
            endpoint: "https://acct.r2.cloudflarestorage.com/".into(),
            bucket: "frames".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
        }
    }

    #[tokio::test]
    async fn builds_client_from_complete_config() {
        let store = R2AssetStore::new(&config()).unwrap();
        assert_eq!(store.bucket(), "frames");
    }

    #[test]
    fn empty_field_is_configuration_error() {
        let mut cfg = config();
        cfg.bucket = " ".into();
        let err = R2AssetStore::new(&cfg).err().unwrap();
        assert_matches!(err, CloudError::Configuration(msg) if msg.contains("R2_BUCKET"));
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret"));
    }
}
