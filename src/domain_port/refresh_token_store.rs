use crate::application_port::*;
use crate::domain_model::*;

/// Outcome of [`RefreshTokenStore::consume_and_replace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Rotated {
        consumed: RefreshTokenId,
        issued: RefreshTokenId,
    },
    /// No active record matched; nothing was written.
    NotActive,
}

/// Server-side table of refresh-token records, keyed by [`TokenDigest`].
///
/// Raw tokens cross this boundary only to be digested. Implementations must
/// make every operation atomic with respect to the others on the same record.
#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert an active record. Fails with `Conflict` if the digest exists.
    async fn create(&self, owner: AccountId, raw_token: &str)
    -> Result<RefreshTokenId, AuthError>;

    /// Absent and revoked records are both reported as `None`.
    async fn find_active_by_raw_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Idempotent.
    async fn revoke(&self, id: RefreshTokenId) -> Result<(), AuthError>;

    /// Removes the record; an unknown token is not an error.
    async fn delete_by_raw_token(&self, raw_token: &str) -> Result<(), AuthError>;

    /// Revoke the active record of `raw_token` owned by `owner` and insert the
    /// successor for the same owner, as one transaction. A successor digest
    /// collision fails the whole call with `Conflict` and leaves the old record
    /// active.
    async fn consume_and_replace(
        &self,
        raw_token: &str,
        owner: AccountId,
        successor_raw_token: &str,
    ) -> Result<Rotation, AuthError>;

    /// Revoke every active record owned by `owner`. Returns how many flipped.
    async fn revoke_all_for_owner(&self, owner: AccountId) -> Result<u64, AuthError>;
}
