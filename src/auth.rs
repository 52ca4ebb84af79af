//! JWT bearer-token authentication
//!
//! Tokens are HS256 JWTs issued by the Link auth service. The claims carry
//! the caller's identity, which the auth middleware turns into an
//! [`AuthenticatedUser`] stored in the request extensions.

use crate::config::AuthConfig;
use crate::error::{LinkError, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Identity of the caller, decoded from a validated token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Stable user identifier (`sub` claim)
    pub user_id: String,
    /// Email address
    pub email: String,
    /// Display name
    pub display_name: String,
    /// Role, e.g. `user` or `admin`
    pub role: String,
}

/// Claims carried by Link access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Role
    #[serde(default = "default_role")]
    pub role: String,
    /// Expiry (seconds since epoch)
    pub exp: u64,
    /// Issued at (seconds since epoch)
    #[serde(default)]
    pub iat: u64,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

fn default_role() -> String {
    "user".to_string()
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            display_name: claims.name,
            role: claims.role,
        }
    }
}

/// Validates and issues HS256 tokens for a single shared secret
#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    issuer: Option<String>,
    default_ttl_seconds: u64,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("issuer", &self.issuer)
            .field("default_ttl_seconds", &self.default_ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Create a validator from the auth configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use link_ai::auth::JwtValidator;
    /// use link_ai::config::AuthConfig;
    ///
    /// let config = AuthConfig {
    ///     jwt_secret: "secret".to_string(),
    ///     ..AuthConfig::default()
    /// };
    /// let validator = JwtValidator::from_config(&config);
    /// assert!(validator.validate("not-a-token").is_err());
    /// ```
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            validation,
            issuer: config.issuer.clone(),
            default_ttl_seconds: config.token_ttl_seconds,
        }
    }

    /// Validate a raw token and return the caller identity
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Authentication` when the signature, expiry or
    /// issuer check fails, or when the subject is empty.
    pub fn validate(&self, token: &str) -> Result<AuthenticatedUser> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| LinkError::Authentication(describe_jwt_error(&e)))?;

        if data.claims.sub.trim().is_empty() {
            return Err(LinkError::Authentication("token has no subject".to_string()).into());
        }

        Ok(data.claims.into())
    }

    /// Issue a signed token for `user`
    ///
    /// `ttl_seconds` falls back to the configured token lifetime.
    pub fn issue(&self, user: &AuthenticatedUser, ttl_seconds: Option<u64>) -> Result<String> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user.user_id.clone(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            role: user.role.clone(),
            exp: now + ttl_seconds.unwrap_or(self.default_ttl_seconds),
            iat: now,
            iss: self.issuer.clone(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(LinkError::Jwt)?)
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn describe_jwt_error(err: &jsonwebtoken::errors::Error) -> String {
    use jsonwebtoken::errors::ErrorKind;

    match err.kind() {
        ErrorKind::ExpiredSignature => "token expired".to_string(),
        ErrorKind::InvalidSignature => "invalid token signature".to_string(),
        ErrorKind::InvalidIssuer => "invalid token issuer".to_string(),
        ErrorKind::InvalidAlgorithm => "unsupported token algorithm".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("token missing claim: {}", claim),
        _ => "malformed token".to_string(),
    }
}
