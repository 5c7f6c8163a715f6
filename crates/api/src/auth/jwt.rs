//! Validation of access tokens issued by the external auth provider.
//!
//! The service never mints tokens. It checks the HS256 signature with the
//! shared secret, the expiry, and the issuer and audience when those are
//! configured. The subject claim carries the provider's user id unchanged.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use storyboard_core::error::CoreError;
use storyboard_core::types::EntityId;

use crate::config::optional_var;

/// Claims this service reads from an access token. `iss` and `aud` are
/// checked by the decoder; any other claims are ignored.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// The user's id at the auth provider.
    pub sub: EntityId,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// Token validation settings.
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret shared with the auth provider.
    pub secret: String,
    /// Required `iss`, if set.
    pub issuer: Option<String>,
    /// Required `aud`, if set.
    pub audience: Option<String>,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

const DEFAULT_LEEWAY_SECS: u64 = 60;

impl JwtConfig {
    /// Load token settings from environment variables.
    ///
    /// | Env Var          | Required | Default |
    /// |------------------|----------|---------|
    /// | `JWT_SECRET`     | **yes**  | --      |
    /// | `JWT_ISSUER`     | no       | unset   |
    /// | `JWT_AUDIENCE`   | no       | unset   |
    /// | `JWT_LEEWAY_SECS`| no       | `60`    |
    pub fn from_env() -> Result<Self, CoreError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CoreError::Configuration("JWT_SECRET must be set".into()))?;

        let leeway_secs = match std::env::var("JWT_LEEWAY_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                CoreError::Configuration(format!("JWT_LEEWAY_SECS must be a whole number, got {raw:?}"))
            })?,
            Err(_) => DEFAULT_LEEWAY_SECS,
        };

        Ok(Self {
            secret,
            issuer: optional_var("JWT_ISSUER"),
            audience: optional_var("JWT_AUDIENCE"),
            leeway_secs,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default(); // HS256, validates exp
        validation.leeway = self.leeway_secs;
        let mut required = vec!["exp", "sub"];
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match &self.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(&required);
        validation
    }
}

/// Validate and decode an access token, returning its [`Claims`].
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &config.validation(),
    )?;
    Ok(token_data.claims)
}
