use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Access and refresh envelopes are signed with separate secrets and separate
/// algorithms, so neither class can be minted with the other's key.
pub const ACCESS_ALGORITHM: Algorithm = Algorithm::HS256;
pub const REFRESH_ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // account id
    role: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // keeps tokens issued within the same second distinct
}

struct TokenClass<'a> {
    algorithm: Algorithm,
    secret: &'a [u8],
    ttl: Duration,
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenError::Malformed)
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
        _ => TokenError::BadSignature,
    }
}

pub struct JwtTokenCodec {
    cfg: JwtConfig,
}

impl JwtTokenCodec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtTokenCodec { cfg }
    }

    fn access_class(&self) -> TokenClass<'_> {
        TokenClass {
            algorithm: ACCESS_ALGORITHM,
            secret: &self.cfg.access_secret,
            ttl: self.cfg.access_ttl,
        }
    }

    fn refresh_class(&self) -> TokenClass<'_> {
        TokenClass {
            algorithm: REFRESH_ALGORITHM,
            secret: &self.cfg.refresh_secret,
            ttl: self.cfg.refresh_ttl,
        }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn issue(
        &self,
        class: TokenClass<'_>,
        subject: AccountId,
        role: Role,
    ) -> Result<(String, TokenPayload), TokenError> {
        let ttl_secs =
            i64::try_from(class.ttl.as_secs()).map_err(|e| TokenError::Internal(e.to_string()))?;
        let iat = Utc::now().timestamp();
        let exp = iat.saturating_add(ttl_secs);
        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            exp,
            iat,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(
            &Header::new(class.algorithm),
            &claims,
            &EncodingKey::from_secret(class.secret),
        )
        .map_err(|e| TokenError::Internal(e.to_string()))?;

        let payload = TokenPayload {
            subject,
            role,
            issued_at: timestamp(iat)?,
            expires_at: timestamp(exp)?,
            token_id: claims.jti,
        };
        Ok((token, payload))
    }

    fn verify(&self, class: TokenClass<'_>, token: &str) -> Result<TokenPayload, TokenError> {
        let mut v = Validation::new(class.algorithm);
        v.validate_exp = true;
        v.leeway = 0;
        v.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        let claims = decode::<Claims>(token, &DecodingKey::from_secret(class.secret), &v)
            .map_err(map_decode_error)?
            .claims;

        // jsonwebtoken accepts a token in its final second; we do not.
        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(TokenPayload {
            subject: claims
                .sub
                .parse::<AccountId>()
                .map_err(|_| TokenError::Malformed)?,
            role: claims
                .role
                .parse::<Role>()
                .map_err(|_| TokenError::Malformed)?,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
            token_id: claims.jti,
        })
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtTokenCodec {
    async fn issue_access_token(
        &self,
        subject: AccountId,
        role: Role,
    ) -> Result<(AccessToken, TokenPayload), TokenError> {
        let (token, payload) = self.issue(self.access_class(), subject, role)?;
        Ok((AccessToken(token), payload))
    }

    async fn issue_refresh_token(
        &self,
        subject: AccountId,
        role: Role,
    ) -> Result<(RefreshToken, TokenPayload), TokenError> {
        let (token, payload) = self.issue(self.refresh_class(), subject, role)?;
        Ok((RefreshToken(token), payload))
    }

    async fn verify_access_token(&self, token: &AccessToken) -> Result<TokenPayload, TokenError> {
        self.verify(self.access_class(), &token.0)
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenPayload, TokenError> {
        self.verify(self.refresh_class(), &token.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            issuer: "turnstile.test".to_string(),
            audience: "test-client".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            access_secret: b"access-secret".to_vec(),
            refresh_secret: b"refresh-secret".to_vec(),
        }
    }

    #[tokio::test]
    async fn issued_tokens_verify_with_their_own_class() {
        let codec = JwtTokenCodec::new(config());
        let subject = AccountId::new_random();

        let (access, issued) = codec.issue_access_token(subject, Role::Admin).await.unwrap();
        let verified = codec.verify_access_token(&access).await.unwrap();
        assert_eq!(verified, issued);
        assert_eq!(verified.role, Role::Admin);
        assert_eq!(
            (verified.expires_at - verified.issued_at).num_seconds(),
            900
        );

        let (refresh, _) = codec.issue_refresh_token(subject, Role::User).await.unwrap();
        let verified = codec.verify_refresh_token(&refresh).await.unwrap();
        assert_eq!(verified.subject, subject);
    }

    #[tokio::test]
    async fn token_classes_do_not_cross_verify() {
        let codec = JwtTokenCodec::new(config());
        let subject = AccountId::new_random();

        let (access, _) = codec.issue_access_token(subject, Role::User).await.unwrap();
        let (refresh, _) = codec.issue_refresh_token(subject, Role::User).await.unwrap();

        assert_eq!(
            codec
                .verify_refresh_token(&RefreshToken(access.0.clone()))
                .await
                .unwrap_err(),
            TokenError::BadSignature
        );
        assert_eq!(
            codec
                .verify_access_token(&AccessToken(refresh.0.clone()))
                .await
                .unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[tokio::test]
    async fn shared_algorithm_with_wrong_secret_is_bad_signature() {
        let codec = JwtTokenCodec::new(config());
        let mut other_cfg = config();
        other_cfg.access_secret = b"someone-else".to_vec();
        let forger = JwtTokenCodec::new(other_cfg);

        let (forged, _) = forger
            .issue_access_token(AccountId::new_random(), Role::Admin)
            .await
            .unwrap();
        assert_eq!(
            codec.verify_access_token(&forged).await.unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let codec = JwtTokenCodec::new(config());
        let err = codec
            .verify_refresh_token(&RefreshToken("not-a-jwt".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err, TokenError::Malformed);
    }

    #[tokio::test]
    async fn zero_ttl_token_is_expired_immediately() {
        let mut cfg = config();
        cfg.refresh_ttl = Duration::ZERO;
        let codec = JwtTokenCodec::new(cfg);

        let (refresh, _) = codec
            .issue_refresh_token(AccountId::new_random(), Role::User)
            .await
            .unwrap();
        assert_eq!(
            codec.verify_refresh_token(&refresh).await.unwrap_err(),
            TokenError::Expired
        );
    }

    #[tokio::test]
    async fn tokens_issued_back_to_back_differ() {
        let codec = JwtTokenCodec::new(config());
        let subject = AccountId::new_random();
        let (a, _) = codec.issue_refresh_token(subject, Role::User).await.unwrap();
        let (b, _) = codec.issue_refresh_token(subject, Role::User).await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("access-secret"));
        assert!(rendered.contains("turnstile.test"));
    }
}
