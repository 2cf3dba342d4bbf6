use super::RotationEngine;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{debug, info};

const MAX_EMAIL_LEN: usize = 254;
const MAX_PASSWORD_LEN: usize = 1024;

/// Verified against when the email is unknown, so both login failures pay the
/// same argon2 cost. Same parameters as [`super::Argon2PasswordHasher`].
const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Registration, login, logout and access-token checks. Holds no state of its
/// own beyond handles to the ports.
pub struct SessionIssuer {
    accounts: Arc<dyn AccountDirectory>,
    credential_hasher: Arc<dyn CredentialHasher>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    token_codec: Arc<dyn TokenCodec>,
    rotation: Arc<RotationEngine>,
}

impl SessionIssuer {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        credential_hasher: Arc<dyn CredentialHasher>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        token_codec: Arc<dyn TokenCodec>,
        rotation: Arc<RotationEngine>,
    ) -> Self {
        Self {
            accounts,
            credential_hasher,
            refresh_store,
            token_codec,
            rotation,
        }
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    fn validate_registration(email: &str, password: &str) -> Result<(), AuthError> {
        let well_formed = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            }
            None => false,
        };
        if !well_formed || email.len() > MAX_EMAIL_LEN {
            return Err(AuthError::InvalidInput("email is not valid".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password is required".to_string()));
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(AuthError::InvalidInput("password too long".to_string()));
        }
        Ok(())
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Account, AuthError> {
        let email = Self::normalize_email(email);
        Self::validate_registration(&email, password)?;

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AuthError::AccountExists);
        }

        let password_hash = self.credential_hasher.hash_password(password).await?;
        // A concurrent registration can still win the insert; the directory
        // reports that as `AccountExists` too.
        let account = self
            .accounts
            .create(NewAccount {
                email,
                password_hash,
                role: Role::default(),
            })
            .await?;

        info!(account = %account.id, "account registered");
        Ok(account)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let email = Self::normalize_email(email);

        let Some(account) = self.accounts.find_by_email(&email).await? else {
            self.credential_hasher
                .verify_password(password, DUMMY_PASSWORD_HASH)
                .await?;
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .credential_hasher
            .verify_password(password, &account.password_hash)
            .await?;
        if !ok {
            debug!(account = %account.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.rotation.issue_root(&account).await?;
        info!(account = %account.id, "login");
        Ok(pair)
    }

    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), AuthError> {
        self.refresh_store
            .delete_by_raw_token(raw_refresh_token)
            .await?;
        debug!("refresh token deleted");
        Ok(())
    }

    pub async fn verify_access_token(&self, access_token: &str) -> Result<AccessIdentity, AuthError> {
        let payload = self
            .token_codec
            .verify_access_token(&AccessToken(access_token.to_string()))
            .await
            .map_err(|e| {
                debug!(error = %e, "access token rejected");
                AuthError::Unauthenticated
            })?;

        Ok(AccessIdentity {
            subject: payload.subject,
            role: payload.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::application_impl::{Argon2PasswordHasher, JwtConfig, JwtTokenCodec};
    use crate::infra_memory::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHasher {
        inner: Argon2PasswordHasher,
        verifications: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl CredentialHasher for CountingHasher {
        async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
            self.inner.hash_password(password).await
        }

        async fn verify_password(
            &self,
            password: &str,
            password_hash: &str,
        ) -> Result<bool, AuthError> {
            self.verifications.fetch_add(1, Ordering::SeqCst);
            self.inner.verify_password(password, password_hash).await
        }
    }

    fn issuer(hasher: Arc<CountingHasher>) -> SessionIssuer {
        let accounts = Arc::new(MemoryAccountDirectory::new());
        let store = Arc::new(MemoryRefreshTokenStore::new());
        let codec = Arc::new(JwtTokenCodec::new(JwtConfig {
            issuer: "turnstile.test".to_string(),
            audience: "test-client".to_string(),
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(3600),
            access_secret: b"access".to_vec(),
            refresh_secret: b"refresh".to_vec(),
        }));
        let rotation = Arc::new(RotationEngine::new(
            accounts.clone(),
            store.clone(),
            codec.clone(),
        ));
        SessionIssuer::new(accounts, hasher, store, codec, rotation)
    }

    #[tokio::test]
    async fn unknown_email_still_pays_for_a_password_check() {
        let hasher = Arc::new(CountingHasher::default());
        let sessions = issuer(hasher.clone());
        sessions.register("a@x.com", "pw1").await.unwrap();

        let wrong_password = sessions.login("a@x.com", "nope").await.unwrap_err();
        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 1);

        let unknown_email = sessions.login("b@x.com", "pw1").await.unwrap_err();
        assert_eq!(hasher.verifications.load(Ordering::SeqCst), 2);

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn dummy_hash_is_a_valid_argon2_hash() {
        let verified = Argon2PasswordHasher
            .verify_password("anything", DUMMY_PASSWORD_HASH)
            .await
            .unwrap();
        assert!(!verified);
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(SessionIssuer::normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn registration_input_is_checked() {
        assert!(SessionIssuer::validate_registration("a@x.com", "pw1").is_ok());
        for (email, password) in [
            ("", "pw1"),
            ("ax.com", "pw1"),
            ("@x.com", "pw1"),
            ("a@", "pw1"),
            ("a@b@c", "pw1"),
            ("a@x.com", ""),
        ] {
            let err = SessionIssuer::validate_registration(email, password).unwrap_err();
            assert!(matches!(err, AuthError::InvalidInput(_)), "{email:?}");
        }
        let long = "p".repeat(MAX_PASSWORD_LEN + 1);
        assert!(SessionIssuer::validate_registration("a@x.com", &long).is_err());
    }
}
