use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Refresh-token lineage state machine.
///
/// A lineage starts at login with one active record. Every successful
/// [`rotate`](RotationEngine::rotate) consumes the presented token and records
/// its successor in the same store transaction. Presenting a token that is no
/// longer active ends the lineage, and by default every other session of the
/// account with it.
pub struct RotationEngine {
    accounts: Arc<dyn AccountDirectory>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    token_codec: Arc<dyn TokenCodec>,
    revoke_on_reuse: bool,
}

impl RotationEngine {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        token_codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            accounts,
            refresh_store,
            token_codec,
            revoke_on_reuse: true,
        }
    }

    /// Whether a `ReuseOrInvalid` outcome revokes all active refresh tokens
    /// of the account. On by default.
    pub fn with_revoke_on_reuse(mut self, enabled: bool) -> Self {
        self.revoke_on_reuse = enabled;
        self
    }

    /// Sign a fresh pair for `account`. Nothing is recorded.
    pub async fn mint_pair(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let (access_token, access) = self
            .token_codec
            .issue_access_token(account.id, account.role)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let (refresh_token, refresh) = self
            .token_codec
            .issue_refresh_token(account.id, account.role)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        })
    }

    /// Start a new lineage: mint a pair and record its refresh token.
    pub async fn issue_root(&self, account: &Account) -> Result<TokenPair, AuthError> {
        let pair = self.mint_pair(account).await?;
        let id = self
            .refresh_store
            .create(account.id, &pair.refresh_token.0)
            .await?;
        debug!(account = %account.id, refresh_id = %id, "lineage started");
        Ok(pair)
    }

    pub async fn rotate(&self, raw_refresh_token: &str) -> Result<TokenPair, AuthError> {
        // The subject comes from the envelope, not the store, so a replayed
        // token still names the account to sweep.
        let payload = self
            .token_codec
            .verify_refresh_token(&RefreshToken(raw_refresh_token.to_string()))
            .await
            .map_err(|e| match e {
                TokenError::Internal(e) => AuthError::Internal(e),
                e => {
                    debug!(error = %e, "refresh token rejected");
                    AuthError::InvalidRefreshToken
                }
            })?;
        let subject = payload.subject;

        let Some(account) = self.accounts.find_by_id(subject).await? else {
            warn!(account = %subject, "refresh token for unknown account");
            return Err(AuthError::InvalidRefreshToken);
        };

        let pair = self.mint_pair(&account).await?;

        match self
            .refresh_store
            .consume_and_replace(raw_refresh_token, subject, &pair.refresh_token.0)
            .await?
        {
            Rotation::Rotated { consumed, issued } => {
                info!(account = %subject, %consumed, %issued, "refresh token rotated");
                Ok(pair)
            }
            Rotation::NotActive => {
                self.contain_reuse(&payload).await?;
                Err(AuthError::ReuseOrInvalid)
            }
        }
    }

    async fn contain_reuse(&self, payload: &TokenPayload) -> Result<(), AuthError> {
        if !self.revoke_on_reuse {
            warn!(
                account = %payload.subject,
                jti = %payload.token_id,
                "inactive refresh token presented"
            );
            return Ok(());
        }

        let revoked = self
            .refresh_store
            .revoke_all_for_owner(payload.subject)
            .await?;
        warn!(
            account = %payload.subject,
            jti = %payload.token_id,
            revoked,
            "inactive refresh token presented, all sessions revoked"
        );
        Ok(())
    }
}
