use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A sellable product variant. Identity is immutable; stock is always scoped
/// to a (variant, warehouse) pair, never to the variant alone.
///
/// The min/max stock levels are the per-product thresholds the availability
/// view classifies warehouse stock against (`bajo_minimo` / `sobre_maximo`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub min_stock_level: Option<Decimal>,
    pub max_stock_level: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl ProductVariant {
    pub fn new(product_id: Uuid, sku: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            sku,
            color: None,
            size: None,
            material: None,
            min_stock_level: None,
            max_stock_level: None,
            created_at: Utc::now(),
        }
    }
}
