//! HTTP client for the image generation service.
//!
//! Sends `POST {api_url}` with a JSON `{ "prompt": ... }` body and expects
//! `{ "image_url": ... }` back, using [`reqwest`].

use async_trait::async_trait;

use crate::{GeneratedImage, ImageGenerator, ImageRequest};

/// Errors from the image generation layer.
#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Image API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The service answered 2xx without a usable image URL.
    #[error("Image API returned no image URL")]
    EmptyResult,
}

/// HTTP client for a single image generation endpoint.
pub struct HttpImageGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpImageGenerator {
    /// Create a client for `api_url`, authenticating with `api_key` as a
    /// bearer token when given.
    pub fn new(api_url: String, api_key: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            api_url,
            api_key,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`ImageGenError::Api`] with the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ImageGenError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImageGenError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage, ImageGenError> {
        let mut builder = self.client.post(&self.api_url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = Self::ensure_success(builder.send().await?).await?;
        let image: GeneratedImage = response.json().await?;
        if image.image_url.trim().is_empty() {
            return Err(ImageGenError::EmptyResult);
        }

        tracing::debug!(image_url = %image.image_url, "Image generated");
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn request_body_omits_unset_fields() {
        let body = serde_json::to_value(ImageRequest::new("a lighthouse at dusk")).unwrap();
        assert_eq!(body, serde_json::json!({"prompt": "a lighthouse at dusk"}));
    }

    #[test]
    fn response_tolerates_minimal_body() {
        let image: GeneratedImage =
            serde_json::from_str(r#"{"image_url":"https://cdn/x.png"}"#).unwrap();
        assert_eq!(image.image_url, "https://cdn/x.png");
        assert_eq!(image.image_key, None);
    }

    #[tokio::test]
    async fn unreachable_service_is_request_error() {
        let generator = HttpImageGenerator::new("http://127.0.0.1:9/generate".into(), None);
        let err = generator
            .generate(&ImageRequest::new("anything"))
            .await
            .unwrap_err();
        assert_matches!(err, ImageGenError::Request(_));
    }
}
