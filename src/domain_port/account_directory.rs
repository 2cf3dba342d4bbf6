use crate::application_port::*;
use crate::domain_model::*;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait::async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Insert an account. Fails with `AccountExists` when the email is taken.
    async fn create(&self, account: NewAccount) -> Result<Account, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError>;

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthError>;
}
