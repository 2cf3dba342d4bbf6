use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("account already exists")]
    AccountExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("refresh token invalid")]
    InvalidRefreshToken,
    #[error("refresh token reused or invalid")]
    ReuseOrInvalid,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("refresh token digest conflict")]
    Conflict,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn store<E: std::fmt::Display>(error: E) -> AuthError {
        AuthError::StoreUnavailable(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token malformed")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token codec failure: {0}")]
    Internal(String),
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(
        &self,
        subject: AccountId,
        role: Role,
    ) -> Result<(AccessToken, TokenPayload), TokenError>;
    async fn issue_refresh_token(
        &self,
        subject: AccountId,
        role: Role,
    ) -> Result<(RefreshToken, TokenPayload), TokenError>;
    async fn verify_access_token(&self, token: &AccessToken) -> Result<TokenPayload, TokenError>;
    async fn verify_refresh_token(&self, token: &RefreshToken)
    -> Result<TokenPayload, TokenError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

/// The surface consumed by the HTTP layer.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> Result<Account, AuthError>;
    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError>;
    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
    /// Never fails because the token is unknown.
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    /// Purely cryptographic; the refresh-token store is not consulted.
    async fn verify_access_token(&self, access_token: &str) -> Result<AccessIdentity, AuthError>;
}
