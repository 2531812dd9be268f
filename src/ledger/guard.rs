use uuid::Uuid;

use crate::{error::LedgerError, store::Identity};

/// Capability check for administrative operations, enforced at the service
/// boundary rather than in the presentation layer.
pub fn require_admin(caller: &Identity) -> Result<(), LedgerError> {
    if caller.is_admin {
        Ok(())
    } else {
        Err(LedgerError::Forbidden)
    }
}

/// Owner-or-admin rule for id-addressed lookups. Name-addressed lookups do
/// not go through here: their ownership check is the join inside the store
/// query itself.
pub fn can_access(caller: &Identity, owners: &[Uuid]) -> bool {
    caller.is_admin || owners.contains(&caller.account_id)
}
