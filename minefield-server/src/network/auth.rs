//! JWT Authentication
//!
//! Validates HS256 tokens issued by the account service and maps them to
//! player ids. The game server never issues tokens. A connection without a
//! valid token plays as a guest.

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::game::state::PlayerId;

/// Authentication configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// HS256 shared secret. `None` makes every connection a guest.
    pub secret: Option<String>,
    /// Expected issuer claim ("iss"). If None, any issuer accepted.
    pub issuer: Option<String>,
    /// Expected audience claim ("aud"). If None, any audience accepted.
    pub audience: Option<String>,
    /// Whether to skip expiry validation (for testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            issuer: std::env::var("AUTH_ISSUER").ok(),
            audience: std::env::var("AUTH_AUDIENCE").ok(),
            skip_expiry: std::env::var("AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Check if authentication is configured.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }
}

/// Claims issued by the account service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account id; becomes the player id.
    #[serde(rename = "userID")]
    pub user_id: String,
    /// Account name.
    #[serde(default)]
    pub username: String,
    /// Expiry timestamp (Unix seconds).
    #[serde(default)]
    pub exp: u64,
    /// Issued at timestamp.
    #[serde(default)]
    pub iat: u64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Player id for this account.
    pub fn player_id(&self) -> PlayerId {
        PlayerId::new(self.user_id.clone())
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authentication configured on server.
    #[error("authentication not configured")]
    NotConfigured,
    /// Token format is invalid.
    #[error("invalid token format")]
    InvalidFormat,
    /// Token signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token has expired.
    #[error("token expired")]
    Expired,
    /// Issuer claim doesn't match expected value.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Audience claim doesn't match expected value.
    #[error("invalid audience")]
    InvalidAudience,
    /// Required claim is missing.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// JWT decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),
}

/// Who a connection plays as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Player id
    pub player_id: PlayerId,
    /// Backed by a valid token?
    pub logged_in: bool,
}

impl Identity {
    /// Fresh guest identity.
    pub fn guest() -> Self {
        Self { player_id: PlayerId::guest(), logged_in: false }
    }
}

/// Validate a JWT token and extract claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    let Some(ref secret) = config.secret else {
        return Err(AuthError::NotConfigured);
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims = std::collections::HashSet::new();

    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    if let Some(ref audience) = config.audience {
        validation.set_audience(&[audience]);
    } else {
        validation.validate_aud = false;
    }

    if config.skip_expiry {
        validation.validate_exp = false;
    }

    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data: TokenData<TokenClaims> = decode(token, &key, &validation)
        .map_err(map_jwt_error)?;

    let claims = token_data.claims;

    if claims.user_id.is_empty() {
        return Err(AuthError::MissingClaim("userID".into()));
    }

    // exp is optional in the claims, so the library check can't be relied on
    if !config.skip_expiry && claims.exp > 0 && (chrono::Utc::now().timestamp() as u64) > claims.exp {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

/// Resolve the identity for a connection's optional token.
///
/// Missing or invalid tokens fall back to a guest; they never refuse the
/// connection.
pub fn resolve_identity(token: Option<&str>, config: &AuthConfig) -> Identity {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Identity::guest();
    };

    match validate_token(token, config) {
        Ok(claims) => {
            debug!("Authenticated {} ({})", claims.user_id, claims.username);
            Identity { player_id: claims.player_id(), logged_in: true }
        }
        Err(e) => {
            debug!("Token rejected, joining as guest: {}", e);
            Identity::guest()
        }
    }
}

/// Map JWT library errors to our error type.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================
