//! Credential checks and stateless bearer tokens (HS256 JWT).

use std::collections::HashMap;
use std::fmt;

use admission_core::UserCredential;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

pub const TOKEN_TYPE: &str = "bearer";
/// Upper bound on `auth.token_ttl_minutes` (one day).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 24 * 60;
const SALT_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Missing or invalid Authorization header")]
    MissingBearer,
    #[error("Invalid token")]
    InvalidToken,
    #[error("token signing failed: {0}")]
    Signing(String),
}

struct PasswordDigest {
    salt: [u8; SALT_LEN],
    digest: [u8; 32],
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(salt);
    h.update(password.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&h.finalize());
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Username → salted SHA-256 digest. Plain-text passwords from config are
/// hashed once at startup and dropped.
pub struct CredentialStore {
    users: HashMap<String, PasswordDigest>,
    // Compared against for unknown users so both paths do the same work.
    decoy: PasswordDigest,
}

impl CredentialStore {
    pub fn from_users(users: &[UserCredential]) -> Self {
        let mut rng = rand::thread_rng();
        let mut digest_for = |password: &str| {
            let mut salt = [0u8; SALT_LEN];
            rng.fill_bytes(&mut salt);
            PasswordDigest { salt, digest: salted_digest(&salt, password) }
        };
        let decoy = digest_for("");
        let users = users.iter().map(|u| (u.username.clone(), digest_for(&u.password))).collect();
        Self { users, decoy }
    }

    pub fn len(&self) -> usize { self.users.len() }
    pub fn is_empty(&self) -> bool { self.users.is_empty() }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let (entry, known) = match self.users.get(username) {
            Some(e) => (e, true),
            None => (&self.decoy, false),
        };
        let matches = constant_time_eq(&salted_digest(&entry.salt, password), &entry.digest);
        if known && matches { Ok(()) } else { Err(AuthError::InvalidCredentials) }
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").field("users", &self.users.keys().collect::<Vec<_>>()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret), validation, ttl }
    }


    pub fn ttl(&self) -> Duration { self.ttl }

    /// Signs a token for `username` that expires one TTL from now.
    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Signing(format!("expiry overflows with ttl {}", self.ttl)))?;
        self.issue_with_expiry(username, expires_at)
    }

    pub fn issue_with_expiry(&self, username: &str, expires_at: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims { sub: username.to_string(), iat: Some(Utc::now().timestamp()), exp: expires_at.timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Checks signature, expiry (no leeway) and presence of `sub`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(kind = ?e.kind(), "token rejected");
                AuthError::InvalidToken
            })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer").field("ttl_minutes", &self.ttl.num_minutes()).finish()
    }
}

/// Token lifetime for a configured minute count, if within `1..=MAX_TOKEN_TTL_MINUTES`.
pub fn token_ttl(minutes: i64) -> Option<Duration> {
    if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&minutes) {
        return None;
    }
    Duration::try_minutes(minutes)
}

/// Extracts `<token>` from `Authorization: Bearer <token>`. The token is
/// taken verbatim after the single space.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let raw = headers.get(AUTHORIZATION).ok_or(AuthError::MissingBearer)?;
    let value = raw.to_str().map_err(|_| AuthError::MissingBearer)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError::MissingBearer)?;
    if token.is_empty() {
        return Err(AuthError::MissingBearer);
    }
    Ok(token)
}
