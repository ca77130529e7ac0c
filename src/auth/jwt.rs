//! JWT Token Handler
//! Mission: issue and validate signed bearer tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// JWT Handler for token operations
///
/// Constructed once at startup from configuration and shared read-only
/// across requests. Distinct handlers with distinct secrets reject each
/// other's tokens.
pub struct JwtHandler {
    secret: String,
    ttl_secs: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with a signing secret and token lifetime
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_secs,
        }
    }

    /// Generate a JWT token for a user
    ///
    /// Claims carry the subject id, username, role, issued-at, and expiry.
    pub fn generate_token(&self, user: &User) -> Result<(String, usize)> {
        let now = Utc::now();
        let issued_at = now.timestamp() as usize;
        let expiration = now
            .checked_add_signed(chrono::Duration::seconds(self.ttl_secs))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            iat: issued_at,
            exp: expiration,
        };

        debug!(
            "Generating JWT for user {} ({}), expires in {}s",
            user.username, user.id, self.ttl_secs
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")?;

        Ok((token, self.ttl_secs as usize))
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => debug!("Rejected expired token"),
                _ => debug!("Rejected malformed token: {}", e),
            }
            e
        })
        .context("Invalid or expired token")?;

        debug!("Validated JWT for user {}", decoded.claims.username);

        Ok(decoded.claims)
    }
}
