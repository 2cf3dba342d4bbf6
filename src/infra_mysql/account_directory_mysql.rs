use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlAccountDirectory {
    pool: MySqlPool,
}

impl MySqlAccountDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlAccountDirectory { pool }
    }

    fn row_to_account(row: MySqlRow) -> Result<Account, AuthError> {
        let id: AccountId = row.try_get("id").map_err(AuthError::store)?;
        let email: String = row.try_get("email").map_err(AuthError::store)?;
        let password_hash: String = row.try_get("password_hash").map_err(AuthError::store)?;
        let role: String = row.try_get("role").map_err(AuthError::store)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(AuthError::store)?;

        Ok(Account {
            id,
            email,
            password_hash,
            role: role.parse::<Role>().map_err(AuthError::store)?,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl AccountDirectory for MySqlAccountDirectory {
    async fn create(&self, account: NewAccount) -> Result<Account, AuthError> {
        let created = Account {
            id: AccountId::new_random(),
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
INSERT INTO account (id, email, password_hash, role, created_at)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(created.id)
        .bind(&created.email)
        .bind(&created.password_hash)
        .bind(created.role.as_str())
        .bind(created.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::AccountExists
            } else {
                AuthError::store(e)
            }
        })?;

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password_hash, role, created_at
FROM account
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::store)?;

        row_opt.map(Self::row_to_account).transpose()
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password_hash, role, created_at
FROM account
WHERE id = ?
"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AuthError::store)?;

        row_opt.map(Self::row_to_account).transpose()
    }
}
