//! Bearer token authentication.
//!
//! Tokens are signed with HMAC-SHA256 and carry their issue time for
//! expiration checking.
//!
//! ## Token Format
//!
//! `<user>.<issued millis>.<hex signature>` where the signature covers
//! `<user>.<issued millis>`.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration with a two hour token lifetime.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(2 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Issues and validates access tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for `user`.
    pub fn create_token(&self, user: &str) -> String {
        let payload = format!("{user}.{}", now_millis());
        let signature = self.sign(payload.as_bytes());
        format!("{payload}.{signature}")
    }

    /// Validates a token and returns the user it was issued to.
    pub fn validate_token(&self, token: &str) -> ServerResult<String> {
        let (payload, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| ServerError::NotAuthorized("malformed token".into()))?;
        let (user, issued) = payload
            .rsplit_once('.')
            .ok_or_else(|| ServerError::NotAuthorized("malformed token".into()))?;
        let issued: u64 = issued
            .parse()
            .map_err(|_| ServerError::NotAuthorized("malformed token".into()))?;

        if self.sign(payload.as_bytes()) != signature {
            return Err(ServerError::NotAuthorized("invalid signature".into()));
        }

        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now_millis() > issued.saturating_add(expiry_millis) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        Ok(user.to_string())
    }

    /// Validates an `Authorization` header value.
    pub fn validate_header(&self, header: Option<&str>) -> ServerResult<String> {
        let header = header.ok_or_else(|| ServerError::NotAuthorized("missing Authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServerError::NotAuthorized("expected a bearer token".into()))?;
        self.validate_token(token.trim())
    }

    /// Signs data with HMAC-SHA256, hex encoded.
    fn sign(&self, data: &[u8]) -> String {
        let mut mac = match HmacSha256::new_from_slice(&self.config.secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(data);
        let digest = mac.finalize().into_bytes();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}
