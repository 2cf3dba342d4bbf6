use super::{RotationEngine, SessionIssuer};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;

pub struct RealAuthService {
    sessions: SessionIssuer,
    rotation: Arc<RotationEngine>,
}

impl RealAuthService {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        credential_hasher: Arc<dyn CredentialHasher>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        token_codec: Arc<dyn TokenCodec>,
        revoke_on_reuse: bool,
    ) -> Self {
        let rotation = Arc::new(
            RotationEngine::new(accounts.clone(), refresh_store.clone(), token_codec.clone())
                .with_revoke_on_reuse(revoke_on_reuse),
        );
        let sessions = SessionIssuer::new(
            accounts,
            credential_hasher,
            refresh_store,
            token_codec,
            rotation.clone(),
        );
        Self { sessions, rotation }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        self.sessions.register(email, password).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        self.sessions.login(email, password).await
    }

    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.rotation.rotate(refresh_token).await
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.sessions.logout(refresh_token).await
    }

    async fn verify_access_token(&self, access_token: &str) -> Result<AccessIdentity, AuthError> {
        self.sessions.verify_access_token(access_token).await
    }
}
