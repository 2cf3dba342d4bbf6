use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, FromRedisValue, RedisError, RedisResult, RedisWrite, Script, ToRedisArgs,
    Value,
};
use std::time::Duration;

const REFRESH_CREATE: &str = include_str!("refresh_create.lua");
const REFRESH_ROTATE: &str = include_str!("refresh_rotate.lua");
const REFRESH_REVOKE: &str = include_str!("refresh_revoke.lua");
const REFRESH_REVOKE_OWNER: &str = include_str!("refresh_revoke_owner.lua");

/// Refresh-token table on a single Redis instance.
///
/// Layout under `prefix`:
/// - `rt:<digest>`: hash {id, owner, revoked, created_at}
/// - `rid:<id>`: digest of the record with that id
/// - `owner:<account id>`: set of digests issued to the account
///
/// Every key expires after `retention`, which should match the refresh TTL.
/// The owner sweep derives record keys inside its script, so the layout is
/// not cluster-safe.
pub struct RedisRefreshTokenStore {
    conn: ConnectionManager,
    prefix: String,
    retention_secs: u64,
    create_script: Script,
    rotate_script: Script,
    revoke_script: Script,
    revoke_owner_script: Script,
}

impl RedisRefreshTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>, retention: Duration) -> Self {
        RedisRefreshTokenStore {
            conn,
            prefix: prefix.into(),
            retention_secs: retention.as_secs().max(1),
            create_script: Script::new(REFRESH_CREATE),
            rotate_script: Script::new(REFRESH_ROTATE),
            revoke_script: Script::new(REFRESH_REVOKE),
            revoke_owner_script: Script::new(REFRESH_REVOKE_OWNER),
        }
    }

    fn record_prefix(&self) -> String {
        format!("{}:rt:", self.prefix)
    }

    fn record_key(&self, digest: &TokenDigest) -> String {
        format!("{}{}", self.record_prefix(), digest.as_str())
    }

    fn id_key(&self, id: RefreshTokenId) -> String {
        format!("{}:rid:{}", self.prefix, id)
    }

    fn owner_key(&self, owner: AccountId) -> String {
        format!("{}:owner:{}", self.prefix, owner)
    }
}

impl ToRedisArgs for AccountId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

impl FromRedisValue for AccountId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        let account_id = s.parse::<AccountId>().map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid AccountId string",
                e.to_string(),
            ))
        })?;
        Ok(account_id)
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn create(
        &self,
        owner: AccountId,
        raw_token: &str,
    ) -> Result<RefreshTokenId, AuthError> {
        let digest = TokenDigest::of(raw_token);
        let id = RefreshTokenId::new_random();
        let mut conn = self.conn.clone();

        let created: i64 = self
            .create_script
            .key(self.record_key(&digest))
            .key(self.id_key(id))
            .key(self.owner_key(owner))
            .arg(id.to_string())
            .arg(&owner)
            .arg(Utc::now().to_rfc3339())
            .arg(self.retention_secs)
            .arg(digest.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(AuthError::store)?;

        match created {
            1 => Ok(id),
            _ => Err(AuthError::Conflict),
        }
    }

    async fn find_active_by_raw_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let digest = TokenDigest::of(raw_token);
        let mut conn = self.conn.clone();

        let (id, owner, revoked, created_at): (
            Option<String>,
            Option<AccountId>,
            Option<String>,
            Option<String>,
        ) = redis::cmd("HMGET")
            .arg(self.record_key(&digest))
            .arg("id")
            .arg("owner")
            .arg("revoked")
            .arg("created_at")
            .query_async(&mut conn)
            .await
            .map_err(AuthError::store)?;

        let (Some(id), Some(owner), Some(revoked), Some(created_at)) =
            (id, owner, revoked, created_at)
        else {
            return Ok(None);
        };
        if revoked != "0" {
            return Ok(None);
        }

        Ok(Some(RefreshTokenRecord {
            id: id.parse::<RefreshTokenId>().map_err(AuthError::store)?,
            hashed_token: digest,
            owner,
            revoked: false,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(AuthError::store)?
                .with_timezone(&Utc),
        }))
    }

    async fn revoke(&self, id: RefreshTokenId) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        let digest: Option<String> = conn
            .get(self.id_key(id))
            .await
            .map_err(AuthError::store)?;
        let Some(digest) = digest else {
            return Ok(());
        };

        let _: i64 = self
            .revoke_script
            .key(self.record_key(&TokenDigest::from_hex(digest)))
            .invoke_async(&mut conn)
            .await
            .map_err(AuthError::store)?;
        Ok(())
    }

    async fn delete_by_raw_token(&self, raw_token: &str) -> Result<(), AuthError> {
        let digest = TokenDigest::of(raw_token);
        let key = self.record_key(&digest);
        let mut conn = self.conn.clone();

        let (id, owner): (Option<String>, Option<AccountId>) = redis::cmd("HMGET")
            .arg(&key)
            .arg("id")
            .arg("owner")
            .query_async(&mut conn)
            .await
            .map_err(AuthError::store)?;

        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore();
        if let Some(id) = id.and_then(|id| id.parse::<RefreshTokenId>().ok()) {
            pipe.del(self.id_key(id)).ignore();
        }
        if let Some(owner) = owner {
            pipe.srem(self.owner_key(owner), digest.as_str()).ignore();
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(AuthError::store)?;
        Ok(())
    }

    async fn consume_and_replace(
        &self,
        raw_token: &str,
        owner: AccountId,
        successor_raw_token: &str,
    ) -> Result<Rotation, AuthError> {
        let digest = TokenDigest::of(raw_token);
        let successor = TokenDigest::of(successor_raw_token);
        let issued = RefreshTokenId::new_random();
        let mut conn = self.conn.clone();

        let (status, consumed): (i64, String) = self
            .rotate_script
            .key(self.record_key(&digest))
            .key(self.record_key(&successor))
            .key(self.id_key(issued))
            .key(self.owner_key(owner))
            .arg(&owner)
            .arg(issued.to_string())
            .arg(Utc::now().to_rfc3339())
            .arg(self.retention_secs)
            .arg(successor.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(AuthError::store)?;

        match status {
            1 => {
                let consumed = consumed
                    .parse::<RefreshTokenId>()
                    .map_err(AuthError::store)?;
                Ok(Rotation::Rotated { consumed, issued })
            }
            0 => Ok(Rotation::NotActive),
            -1 => Err(AuthError::Conflict),
            other => Err(AuthError::Internal(format!(
                "unknown rotate script status {other}"
            ))),
        }
    }

    async fn revoke_all_for_owner(&self, owner: AccountId) -> Result<u64, AuthError> {
        let mut conn = self.conn.clone();
        let revoked: u64 = self
            .revoke_owner_script
            .key(self.owner_key(owner))
            .arg(self.record_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(AuthError::store)?;
        Ok(revoked)
    }
}
