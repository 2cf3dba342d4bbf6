use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlConnection, MySqlPool, Row};

pub struct MySqlRefreshTokenStore {
    pool: MySqlPool,
}

impl MySqlRefreshTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenStore { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshTokenRecord, AuthError> {
        let id: RefreshTokenId = row.try_get("id").map_err(AuthError::store)?;
        let hashed_token: String = row.try_get("hashed_token").map_err(AuthError::store)?;
        let owner: AccountId = row.try_get("owner_account_id").map_err(AuthError::store)?;
        let revoked: bool = row.try_get("revoked").map_err(AuthError::store)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(AuthError::store)?;

        Ok(RefreshTokenRecord {
            id,
            hashed_token: TokenDigest::from_hex(hashed_token),
            owner,
            revoked,
            created_at,
        })
    }

    async fn insert(
        conn: &mut MySqlConnection,
        owner: AccountId,
        digest: &TokenDigest,
    ) -> Result<RefreshTokenId, AuthError> {
        let id = RefreshTokenId::new_random();

        sqlx::query(
            r#"
INSERT INTO refresh_token (id, hashed_token, owner_account_id, revoked, created_at)
VALUES (?, ?, ?, FALSE, ?)
"#,
        )
        .bind(id)
        .bind(digest.as_str())
        .bind(owner)
        .bind(Utc::now())
        .execute(conn)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::Conflict
            } else {
                AuthError::store(e)
            }
        })?;

        Ok(id)
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MySqlRefreshTokenStore {
    async fn create(
        &self,
        owner: AccountId,
        raw_token: &str,
    ) -> Result<RefreshTokenId, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(AuthError::store)?;
        Self::insert(&mut conn, owner, &TokenDigest::of(raw_token)).await
    }

    async fn find_active_by_raw_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, hashed_token, owner_account_id, revoked, created_at
FROM refresh_token
WHERE hashed_token = ? AND revoked = FALSE
"#,
        )
        .bind(TokenDigest::of(raw_token).as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::store)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn revoke(&self, id: RefreshTokenId) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_token SET revoked = TRUE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AuthError::store)?;
        Ok(())
    }

    async fn delete_by_raw_token(&self, raw_token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM refresh_token WHERE hashed_token = ?")
            .bind(TokenDigest::of(raw_token).as_str())
            .execute(&self.pool)
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

        let mut tx = self.pool.begin().await.map_err(AuthError::store)?;

        // The `revoked = FALSE` guard makes this the serialization point:
        // of two racing transactions only one sees a row affected.
        let consumed: Option<RefreshTokenId> = sqlx::query_scalar(
            r#"
SELECT id
FROM refresh_token
WHERE hashed_token = ? AND owner_account_id = ? AND revoked = FALSE
FOR UPDATE
"#,
        )
        .bind(digest.as_str())
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AuthError::store)?;

        let Some(consumed) = consumed else {
            tx.rollback().await.map_err(AuthError::store)?;
            return Ok(Rotation::NotActive);
        };

        let updated =
            sqlx::query("UPDATE refresh_token SET revoked = TRUE WHERE id = ? AND revoked = FALSE")
                .bind(consumed)
                .execute(&mut *tx)
                .await
                .map_err(AuthError::store)?
                .rows_affected();
        if updated != 1 {
            tx.rollback().await.map_err(AuthError::store)?;
            return Ok(Rotation::NotActive);
        }

        // Dropping `tx` on error rolls the revoke back.
        let issued = Self::insert(&mut tx, owner, &successor).await?;

        tx.commit().await.map_err(AuthError::store)?;

        Ok(Rotation::Rotated { consumed, issued })
    }

    async fn revoke_all_for_owner(&self, owner: AccountId) -> Result<u64, AuthError> {
        let revoked = sqlx::query(
            "UPDATE refresh_token SET revoked = TRUE WHERE owner_account_id = ? AND revoked = FALSE",
        )
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(AuthError::store)?
        .rows_affected();
        Ok(revoked)
    }
}
