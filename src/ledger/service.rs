use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::LedgerError,
    store::{AccountSummary, DebitOutcome, Identity, LedgerStore, ResourceRow},
};

use super::guard;

/// Outcome of a successful spend, including the confirmation line shown to
/// the caller.
#[derive(Debug, Serialize)]
pub struct Receipt {
    pub resource_id: Uuid,
    pub name: String,
    pub spent: i64,
    pub remaining: i64,
    pub message: String,
}

fn validate_name(name: &str) -> Result<&str, LedgerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::InvalidRequest("resource name is empty".into()));
    }
    if name.len() > 100 {
        return Err(LedgerError::InvalidRequest("resource name too long".into()));
    }
    Ok(name)
}

fn validate_amount(amount: i64) -> Result<i64, LedgerError> {
    if amount < 0 {
        return Err(LedgerError::InvalidAmount(
            "amount must not be negative".into(),
        ));
    }
    Ok(amount)
}

/// Grant `amount` of a new resource named `name` to `target_username`.
/// Admin capability required; a second allocation of the same name to the
/// same account is rejected rather than creating a duplicate row.
pub async fn allocate(
    store: &dyn LedgerStore,
    caller: &Identity,
    target_username: &str,
    name: &str,
    amount: i64,
) -> Result<ResourceRow, LedgerError> {
    guard::require_admin(caller)?;
    let name = validate_name(name)?;
    let amount = validate_amount(amount)?;

    let account_id = store
        .account_for_username(target_username.trim())
        .await?
        .ok_or(LedgerError::NotFound)?;

    let resource = store.create_resource(account_id, name, amount).await?;
    info!(
        admin = %caller.username,
        to = %target_username,
        resource_id = %resource.id,
        name = %resource.name,
        amount,
        "resource allocated"
    );
    Ok(resource)
}

/// Decrement the caller's balance of the named resource. The store debits
/// under a row lock, so the balance can never go below zero even under
/// concurrent spends.
pub async fn spend(
    store: &dyn LedgerStore,
    caller: &Identity,
    name: &str,
    amount: i64,
) -> Result<Receipt, LedgerError> {
    let name = validate_name(name)?;
    let amount = validate_amount(amount)?;

    match store.debit_resource(caller.account_id, name, amount).await? {
        DebitOutcome::Spent {
            resource_id,
            remaining,
        } => {
            info!(
                account_id = %caller.account_id,
                resource_id = %resource_id,
                name,
                amount,
                remaining,
                "resource spent"
            );
            Ok(Receipt {
                resource_id,
                name: name.to_string(),
                spent: amount,
                remaining,
                message: format!("Spent {amount} {name}. {remaining} {name} remaining."),
            })
        }
        DebitOutcome::Insufficient { available } => Err(LedgerError::InsufficientBalance {
            available,
            requested: amount,
        }),
        // Missing and not-owned are indistinguishable to the caller.
        DebitOutcome::NotOwned => Err(LedgerError::Forbidden),
    }
}

/// Look up one resource in the caller's own account. The ownership join in
/// the store query is the access check.
pub async fn view(
    store: &dyn LedgerStore,
    caller: &Identity,
    name: &str,
) -> Result<ResourceRow, LedgerError> {
    let name = validate_name(name)?;
    store
        .resource_for_account(caller.account_id, name)
        .await?
        .ok_or(LedgerError::Forbidden)
}

/// Id-addressed lookup, allowed for an owner or an admin.
pub async fn view_by_id(
    store: &dyn LedgerStore,
    caller: &Identity,
    resource_id: Uuid,
) -> Result<ResourceRow, LedgerError> {
    let Some((resource, owners)) = store.resource_with_owners(resource_id).await? else {
        return Err(LedgerError::Forbidden);
    };
    if !guard::can_access(caller, &owners) {
        return Err(LedgerError::Forbidden);
    }
    Ok(resource)
}

pub async fn list_resources(
    store: &dyn LedgerStore,
    caller: &Identity,
) -> Result<Vec<ResourceRow>, LedgerError> {
    store.resources_for_account(caller.account_id).await
}

pub async fn list_accounts(
    store: &dyn LedgerStore,
    caller: &Identity,
) -> Result<Vec<AccountSummary>, LedgerError> {
    guard::require_admin(caller)?;
    store.list_accounts().await
}

/// Admin view into any account's holdings.
pub async fn account_resources(
    store: &dyn LedgerStore,
    caller: &Identity,
    username: &str,
) -> Result<Vec<ResourceRow>, LedgerError> {
    guard::require_admin(caller)?;
    let account_id = store
        .account_for_username(username.trim())
        .await?
        .ok_or(LedgerError::NotFound)?;
    store.resources_for_account(account_id).await
}
