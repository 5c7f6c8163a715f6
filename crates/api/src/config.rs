use storyboard_cloud::R2Config;
use storyboard_core::error::CoreError;

use crate::auth::jwt::JwtConfig;

/// Image generation endpoint. Absent when `IMAGE_API_URL` is unset.
#[derive(Debug, Clone)]
pub struct ImageApiConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Not applied to
    /// streaming routes.
    pub request_timeout_secs: u64,
    /// Interval between SSE keep-alive comments (default: `15`).
    pub sse_keepalive_secs: u64,
    /// How long a finished build session stays live (default: `300`).
    pub session_retention_secs: u64,
    /// Idle time after which a project's card sequence leaves memory
    /// (default: `600`).
    pub frame_idle_secs: u64,
    /// Idle time after which a project's ordering write worker exits
    /// (default: `60`).
    pub write_idle_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Image generation API; builds requesting images fail without it.
    pub image_api: Option<ImageApiConfig>,
    /// Asset bucket; asset deletes are skipped without it.
    pub r2: Option<R2Config>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                    |
    /// |--------------------------|----------------------------|
    /// | `HOST`                   | `0.0.0.0`                  |
    /// | `PORT`                   | `3000`                     |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                       |
    /// | `SSE_KEEPALIVE_SECS`     | `15`                       |
    /// | `SESSION_RETENTION_SECS` | `300`                      |
    /// | `FRAME_IDLE_SECS`        | `600`                      |
    /// | `WRITE_IDLE_SECS`        | `60`                       |
    /// | `JWT_*`                  | see [`JwtConfig::from_env`] |
    /// | `IMAGE_API_URL`          | unset (images disabled)    |
    /// | `IMAGE_API_KEY`          | unset                      |
    /// | `R2_ENDPOINT`, `R2_BUCKET`, `R2_ACCESS_KEY_ID`, `R2_SECRET_ACCESS_KEY` | unset (asset deletes skipped) |
    ///
    /// Malformed numbers and a missing `JWT_SECRET` are
    /// [`CoreError::Configuration`] errors.
    pub fn from_env() -> Result<Self, CoreError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = parse_var("PORT", 3000)?;

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", 30)?;
        let sse_keepalive_secs = parse_var("SSE_KEEPALIVE_SECS", 15)?;
        let session_retention_secs = parse_var("SESSION_RETENTION_SECS", 300)?;
        let frame_idle_secs = parse_var("FRAME_IDLE_SECS", 600)?;
        let write_idle_secs = parse_var("WRITE_IDLE_SECS", 60)?;

        let jwt = JwtConfig::from_env()?;

        let image_api = optional_var("IMAGE_API_URL").map(|url| ImageApiConfig {
            url,
            api_key: optional_var("IMAGE_API_KEY"),
        });

        let r2_vars = [
            optional_var("R2_ENDPOINT"),
            optional_var("R2_BUCKET"),
            optional_var("R2_ACCESS_KEY_ID"),
            optional_var("R2_SECRET_ACCESS_KEY"),
        ];
        let r2 = match r2_vars {
            [None, None, None, None] => None,
            [endpoint, bucket, access_key_id, secret_access_key] => Some(R2Config {
                endpoint: endpoint.unwrap_or_default(),
                bucket: bucket.unwrap_or_default(),
                access_key_id: access_key_id.unwrap_or_default(),
                secret_access_key: secret_access_key.unwrap_or_default(),
            }),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            sse_keepalive_secs,
            session_retention_secs,
            frame_idle_secs,
            write_idle_secs,
            jwt,
            image_api,
            r2,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CoreError::Configuration(format!("{name} is not a valid number: {raw:?}"))),
        None => Ok(default),
    }
}

/// A set, non-blank variable.
pub(crate) fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn malformed_number_is_configuration_error() {
        std::env::set_var("STORYBOARD_TEST_BAD_SECS", "ten");
        assert_matches!(
            parse_var::<u64>("STORYBOARD_TEST_BAD_SECS", 1),
            Err(CoreError::Configuration(_))
        );
    }

    #[test]
    fn blank_number_falls_back_to_default() {
        std::env::set_var("STORYBOARD_TEST_BLANK_SECS", "  ");
        assert_eq!(parse_var::<u64>("STORYBOARD_TEST_BLANK_SECS", 7).unwrap(), 7);
        assert_eq!(parse_var::<u16>("STORYBOARD_TEST_UNSET_PORT", 3000).unwrap(), 3000);
    }
}
