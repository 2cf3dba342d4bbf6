use super::{AccountId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct RefreshTokenId(pub uuid::Uuid);

impl RefreshTokenId {
    pub fn new_random() -> Self {
        RefreshTokenId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for RefreshTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RefreshTokenId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(RefreshTokenId)
    }
}

/// Lowercase hex SHA-256 of a raw refresh token. This is the only form of a
/// refresh token that is ever persisted.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct TokenDigest(String);

impl TokenDigest {
    pub fn of(raw_token: &str) -> Self {
        TokenDigest(hex::encode(Sha256::digest(raw_token.as_bytes())))
    }

    /// Wraps a digest read back from storage.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        TokenDigest(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Digests are not secrets, but they are long; keep logs readable.
impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(12).collect();
        write!(f, "TokenDigest({}..)", head)
    }
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: RefreshTokenId,
    pub hashed_token: TokenDigest,
    pub owner: AccountId,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Eq, PartialEq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Clone, Eq, PartialEq, Serialize)]
pub struct RefreshToken(pub String);

// Bearer values must not end up in logs through `{:?}`.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshToken(***)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// What a verified token envelope carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub subject: AccountId,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub token_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessIdentity {
    pub subject: AccountId,
    pub role: Role,
}
