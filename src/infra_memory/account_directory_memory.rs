use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Accounts {
    by_id: HashMap<AccountId, Account>,
    id_by_email: HashMap<String, AccountId>,
}

#[derive(Default)]
pub struct MemoryAccountDirectory {
    accounts: Mutex<Accounts>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the role of an existing account. Returns false if it is unknown.
    pub fn set_role(&self, id: AccountId, role: Role) -> Result<bool, AuthError> {
        let mut accounts = self.accounts.lock().map_err(AuthError::store)?;
        match accounts.by_id.get_mut(&id) {
            Some(account) => {
                account.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, id: AccountId) -> Result<Option<Account>, AuthError> {
        let mut accounts = self.accounts.lock().map_err(AuthError::store)?;
        let removed = accounts.by_id.remove(&id);
        if let Some(account) = &removed {
            accounts.id_by_email.remove(&account.email);
        }
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn create(&self, account: NewAccount) -> Result<Account, AuthError> {
        let mut accounts = self.accounts.lock().map_err(AuthError::store)?;
        if accounts.id_by_email.contains_key(&account.email) {
            return Err(AuthError::AccountExists);
        }

        let created = Account {
            id: AccountId::new_random(),
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            created_at: Utc::now(),
        };
        accounts
            .id_by_email
            .insert(created.email.clone(), created.id);
        accounts.by_id.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let accounts = self.accounts.lock().map_err(AuthError::store)?;
        Ok(accounts
            .id_by_email
            .get(email)
            .and_then(|id| accounts.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, AuthError> {
        let accounts = self.accounts.lock().map_err(AuthError::store)?;
        Ok(accounts.by_id.get(&id).cloned())
    }
}
