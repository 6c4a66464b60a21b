use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A physical stock-holding location ("bodega"), optionally also a point of
/// sale. Warehouses are never hard-deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Warehouse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub is_point_of_sale: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Warehouse {
    pub fn new(code: String, name: String, address: Option<String>, is_point_of_sale: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            address,
            is_point_of_sale,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
