use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::LedgerError;

#[cfg(test)]
pub mod mem;
pub mod pg;

pub use pg::PgStore;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: OffsetDateTime,
}

/// Request-scoped identity: the authenticated user and the account the
/// request acts on. Built once per request by the `Caller` extractor and
/// passed into every service call instead of being read from ambient state.
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

/// A named quantity pool granted to the account(s) it was allocated to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub name: String,
    pub available: i64,
    pub created_at: OffsetDateTime,
}

/// Admin-facing account listing entry.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccountSummary {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub balance: Option<i64>,
    pub resources: i64,
    pub created_at: OffsetDateTime,
}

/// Result of an atomic balance decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The full amount was deducted.
    Spent { resource_id: Uuid, remaining: i64 },
    /// Balance too low; nothing was changed.
    Insufficient { available: i64 },
    /// No such resource in the account's ownership set.
    NotOwned,
}

/// Persistence seam for the ledger. Every method is one complete atomic
/// operation; a failure mid-operation leaves no partial state behind.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create a user and its account together. Fails with `DuplicateUser`
    /// if the username is taken.
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<Identity, LedgerError>;

    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<UserRow>, LedgerError>;

    /// Resolve an authenticated user id to a request identity.
    async fn load_identity(&self, user_id: Uuid) -> Result<Option<Identity>, LedgerError>;

    async fn account_for_username(&self, username: &str) -> Result<Option<Uuid>, LedgerError>;

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, LedgerError>;

    /// Create a resource and link it to the account in one transaction.
    /// Fails with `DuplicateResource` if the account already holds `name`.
    async fn create_resource(
        &self,
        account_id: Uuid,
        name: &str,
        initial: i64,
    ) -> Result<ResourceRow, LedgerError>;

    /// Ownership-scoped lookup: only finds a resource linked to
    /// `account_id`. The join is the access check — there is no way to
    /// fetch by name without it.
    async fn resource_for_account(
        &self,
        account_id: Uuid,
        name: &str,
    ) -> Result<Option<ResourceRow>, LedgerError>;

    async fn resource_with_owners(
        &self,
        resource_id: Uuid,
    ) -> Result<Option<(ResourceRow, Vec<Uuid>)>, LedgerError>;

    async fn resources_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ResourceRow>, LedgerError>;

    /// Atomically decrement `available` for the named resource in the
    /// account's ownership set. The current balance is re-read under a row
    /// lock, so two concurrent spends can never both succeed past it.
    async fn debit_resource(
        &self,
        account_id: Uuid,
        name: &str,
        amount: i64,
    ) -> Result<DebitOutcome, LedgerError>;
}
