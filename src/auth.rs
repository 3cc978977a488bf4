//! JWT-backed sessions.
//!
//! Tokens carry the principal's id, role and department. [`JwtSessions`] is
//! the [`SessionProvider`] used in deployment: it reads a Bearer token from
//! the `Authorization` header and reports the claims as a
//! [`SessionRecord`]. Role validation is left to the resolver.

use hyper::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Auth as AuthConfig;
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::router::BoxFuture;
use crate::session::{SessionProvider, SessionRecord};

const MIN_SECRET_LENGTH: usize = 32;

fn validate_secret(config: &AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < MIN_SECRET_LENGTH {
        return Err(Error::Config(format!(
            "JWT secret must be at least {MIN_SECRET_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Role name as issued; may be absent on legacy tokens
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Create a JWT token for a principal.
pub fn create_token(config: &AuthConfig, principal: &Principal) -> Result<String> {
    validate_secret(config)?;
    let now = jiff::Timestamp::now();
    let exp = jiff::Span::new()
        .try_hours(i64::from(config.token_expiry_days) * 24)
        .and_then(|lifetime| now.checked_add(lifetime))
        .map_err(|e| {
            Error::Config(format!(
                "token_expiry_days = {} is out of range: {e}",
                config.token_expiry_days
            ))
        })?;

    let claims = Claims {
        sub: principal.id.clone(),
        role: Some(principal.role.as_str().to_string()),
        department: principal.department.clone(),
        exp: exp.as_second(),
        iat: now.as_second(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token creation failed: {e}")))?;

    Ok(token)
}

/// Verify and decode a JWT token.
///
/// # Returns
/// - `Ok(Claims)` if the token is valid
/// - `Err(Error::TokenExpired)` if the token has expired
/// - `Err(Error::Unauthorized)` for any other validation failure
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims> {
    validate_secret(config)?;
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
        _ => Error::Unauthorized,
    })?;

    Ok(token_data.claims)
}

/// Extract the Bearer token from the Authorization header.
///
/// # Returns
/// - `Ok(None)` if there is no Authorization header
/// - `Ok(Some(token))` for `Bearer <token>` (scheme is case-insensitive)
/// - `Err(Error::Unauthorized)` for any other header value
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get("Authorization") else {
        return Ok(None);
    };
    let auth_header = value.to_str().map_err(|_| Error::Unauthorized)?;

    auth_header
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("bearer "))
        .map(|_| Some(auth_header[7..].trim()))
        .ok_or(Error::Unauthorized)
}

/// Session provider backed by signed tokens.
pub struct JwtSessions {
    config: AuthConfig,
}

impl JwtSessions {
    pub fn new(config: AuthConfig) -> Result<Self> {
        validate_secret(&config)?;
        Ok(Self { config })
    }
}

impl SessionProvider for JwtSessions {
    fn current_session<'a>(
        &'a self,
        headers: &'a HeaderMap,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>>> {
        Box::pin(async move {
            let Some(token) = bearer_token(headers)? else {
                return Ok(None);
            };
            let claims = verify_token(&self.config, token)?;
            Ok(Some(SessionRecord {
                user_id: claims.sub,
                role: claims.role,
                department: claims.department,
            }))
        })
    }
}
