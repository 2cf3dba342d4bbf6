use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Records {
    by_digest: HashMap<TokenDigest, RefreshTokenRecord>,
    digest_by_id: HashMap<RefreshTokenId, TokenDigest>,
}

impl Records {
    fn insert(
        &mut self,
        owner: AccountId,
        digest: TokenDigest,
    ) -> Result<RefreshTokenId, AuthError> {
        if self.by_digest.contains_key(&digest) {
            return Err(AuthError::Conflict);
        }

        let id = RefreshTokenId::new_random();
        self.digest_by_id.insert(id, digest.clone());
        self.by_digest.insert(
            digest.clone(),
            RefreshTokenRecord {
                id,
                hashed_token: digest,
                owner,
                revoked: false,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }
}

/// Single-process store. One mutex guards both tables, so every operation is
/// serialized against every other.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    records: Mutex<Records>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, revoked ones included.
    pub fn len(&self) -> Result<usize, AuthError> {
        let records = self.records.lock().map_err(AuthError::store)?;
        Ok(records.by_digest.len())
    }

    pub fn is_empty(&self) -> Result<bool, AuthError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(
        &self,
        owner: AccountId,
        raw_token: &str,
    ) -> Result<RefreshTokenId, AuthError> {
        let mut records = self.records.lock().map_err(AuthError::store)?;
        records.insert(owner, TokenDigest::of(raw_token))
    }

    async fn find_active_by_raw_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let records = self.records.lock().map_err(AuthError::store)?;
        Ok(records
            .by_digest
            .get(&TokenDigest::of(raw_token))
            .filter(|record| !record.revoked)
            .cloned())
    }

    async fn revoke(&self, id: RefreshTokenId) -> Result<(), AuthError> {
        let mut records = self.records.lock().map_err(AuthError::store)?;
        let Some(digest) = records.digest_by_id.get(&id).cloned() else {
            return Ok(());
        };
        if let Some(record) = records.by_digest.get_mut(&digest) {
            record.revoked = true;
        }
        Ok(())
    }

    async fn delete_by_raw_token(&self, raw_token: &str) -> Result<(), AuthError> {
        let mut records = self.records.lock().map_err(AuthError::store)?;
        if let Some(record) = records.by_digest.remove(&TokenDigest::of(raw_token)) {
            records.digest_by_id.remove(&record.id);
        }
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

        let mut records = self.records.lock().map_err(AuthError::store)?;

        let consumed = match records.by_digest.get(&digest) {
            Some(record) if !record.revoked && record.owner == owner => record.id,
            _ => return Ok(Rotation::NotActive),
        };
        // Checked before anything is written so a collision leaves the old record active.
        if records.by_digest.contains_key(&successor) {
            return Err(AuthError::Conflict);
        }

        if let Some(record) = records.by_digest.get_mut(&digest) {
            record.revoked = true;
        }
        let issued = records.insert(owner, successor)?;

        Ok(Rotation::Rotated { consumed, issued })
    }

    async fn revoke_all_for_owner(&self, owner: AccountId) -> Result<u64, AuthError> {
        let mut records = self.records.lock().map_err(AuthError::store)?;
        let mut revoked = 0;
        for record in records.by_digest.values_mut() {
            if record.owner == owner && !record.revoked {
                record.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
