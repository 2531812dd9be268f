use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::LedgerError;

use super::{AccountSummary, DebitOutcome, Identity, LedgerStore, ResourceRow, UserRow};

#[derive(Default)]
struct Tables {
    users: Vec<UserRow>,
    // (account_id, user_id, created_at)
    accounts: Vec<(Uuid, Uuid, OffsetDateTime)>,
    resources: Vec<ResourceRow>,
    // (account_id, resource_id)
    links: Vec<(Uuid, Uuid)>,
}

/// In-memory stand-in for `PgStore`. One mutex guards all tables, so each
/// trait method is atomic the same way one database transaction is.
#[derive(Default)]
pub struct MemStore {
    tables: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemStore {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<Identity, LedgerError> {
        let mut t = self.tables.lock().expect("store lock");
        if t.users.iter().any(|u| u.username == username) {
            return Err(LedgerError::DuplicateUser);
        }
        let user = UserRow {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_admin: admin,
            created_at: OffsetDateTime::now_utc(),
        };
        let account_id = Uuid::new_v4();
        t.accounts
            .push((account_id, user.id, OffsetDateTime::now_utc()));
        let identity = Identity {
            user_id: user.id,
            account_id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        };
        t.users.push(user);
        Ok(identity)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRow>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn load_identity(&self, user_id: Uuid) -> Result<Option<Identity>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        let Some(user) = t.users.iter().find(|u| u.id == user_id) else {
            return Ok(None);
        };
        let account = t
            .accounts
            .iter()
            .filter(|(_, uid, _)| *uid == user_id)
            .min_by_key(|(_, _, created)| *created);
        Ok(account.map(|(account_id, _, _)| Identity {
            user_id: user.id,
            account_id: *account_id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }))
    }

    async fn account_for_username(&self, username: &str) -> Result<Option<Uuid>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        let Some(user) = t.users.iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        Ok(t.accounts
            .iter()
            .filter(|(_, uid, _)| *uid == user.id)
            .min_by_key(|(_, _, created)| *created)
            .map(|(account_id, _, _)| *account_id))
    }

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        let mut out = Vec::new();
        for (account_id, user_id, created_at) in &t.accounts {
            let Some(user) = t.users.iter().find(|u| u.id == *user_id) else {
                continue;
            };
            let resources = t.links.iter().filter(|(a, _)| a == account_id).count() as i64;
            out.push(AccountSummary {
                account_id: *account_id,
                user_id: *user_id,
                username: user.username.clone(),
                is_admin: user.is_admin,
                balance: None,
                resources,
                created_at: *created_at,
            });
        }
        out.sort_by_key(|a| a.created_at);
        Ok(out)
    }

    async fn create_resource(
        &self,
        account_id: Uuid,
        name: &str,
        initial: i64,
    ) -> Result<ResourceRow, LedgerError> {
        let mut t = self.tables.lock().expect("store lock");
        if !t.accounts.iter().any(|(id, _, _)| *id == account_id) {
            return Err(LedgerError::NotFound);
        }
        let taken = t.links.iter().any(|(a, r)| {
            *a == account_id && t.resources.iter().any(|res| res.id == *r && res.name == name)
        });
        if taken {
            return Err(LedgerError::DuplicateResource(name.to_string()));
        }
        let resource = ResourceRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            available: initial,
            created_at: OffsetDateTime::now_utc(),
        };
        t.links.push((account_id, resource.id));
        t.resources.push(resource.clone());
        Ok(resource)
    }

    async fn resource_for_account(
        &self,
        account_id: Uuid,
        name: &str,
    ) -> Result<Option<ResourceRow>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        Ok(t.resources
            .iter()
            .find(|r| {
                r.name == name
                    && t.links
                        .iter()
                        .any(|(a, res)| *a == account_id && *res == r.id)
            })
            .cloned())
    }

    async fn resource_with_owners(
        &self,
        resource_id: Uuid,
    ) -> Result<Option<(ResourceRow, Vec<Uuid>)>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        let Some(resource) = t.resources.iter().find(|r| r.id == resource_id) else {
            return Ok(None);
        };
        let owners = t
            .links
            .iter()
            .filter(|(_, r)| *r == resource_id)
            .map(|(a, _)| *a)
            .collect();
        Ok(Some((resource.clone(), owners)))
    }

    async fn resources_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ResourceRow>, LedgerError> {
        let t = self.tables.lock().expect("store lock");
        let mut rows: Vec<ResourceRow> = t
            .resources
            .iter()
            .filter(|r| {
                t.links
                    .iter()
                    .any(|(a, res)| *a == account_id && *res == r.id)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn debit_resource(
        &self,
        account_id: Uuid,
        name: &str,
        amount: i64,
    ) -> Result<DebitOutcome, LedgerError> {
        let mut t = self.tables.lock().expect("store lock");
        let owned: Vec<Uuid> = t
            .links
            .iter()
            .filter(|(a, _)| *a == account_id)
            .map(|(_, r)| *r)
            .collect();
        let Some(resource) = t
            .resources
            .iter_mut()
            .find(|r| r.name == name && owned.contains(&r.id))
        else {
            return Ok(DebitOutcome::NotOwned);
        };
        if amount > resource.available {
            return Ok(DebitOutcome::Insufficient {
                available: resource.available,
            });
        }
        resource.available -= amount;
        Ok(DebitOutcome::Spent {
            resource_id: resource.id,
            remaining: resource.available,
        })
    }
}
