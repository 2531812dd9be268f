use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::ResourceRow;

#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    pub amount: i64,
}

/// Request body for an administrative allocation.
#[derive(Debug, Deserialize)]
pub struct AllocateRequest {
    pub to: String,
    pub name: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub id: Uuid,
    pub name: String,
    pub available: i64,
    pub created_at: OffsetDateTime,
}

impl From<ResourceRow> for ResourceResponse {
    fn from(row: ResourceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            available: row.available,
            created_at: row.created_at,
        }
    }
}
