use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::catalog::VariantCatalog;
use crate::services::warehouses::WarehouseService;
use crate::stock::StockStore;

/// Classification of a warehouse's available stock against the variant's
/// configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    SinStock,
    BajoMinimo,
    SobreMaximo,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WarehouseStockEntry {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub is_point_of_sale: bool,
    pub available: Decimal,
    pub reserved: Decimal,
    pub status: StockStatus,
    pub can_sell_from_here: bool,
    /// Share of the variant's total available stock, rounded to whole
    /// percent. Report-only: never an input to any mutation.
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SuggestedWarehouse {
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub available: Decimal,
    pub reason: String,
}

/// Sale-ready availability snapshot for one variant, recomputed from the
/// live stock records on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StockAvailability {
    pub variant_id: Uuid,
    pub total_system: Decimal,
    pub total_available: Decimal,
    pub total_reserved: Decimal,
    pub can_sell: bool,
    pub max_sellable_quantity: Decimal,
    pub suggested_warehouse: Option<SuggestedWarehouse>,
    pub by_warehouse: Vec<WarehouseStockEntry>,
    pub computed_at: DateTime<Utc>,
}

/// Pure read side of the ledger: folds per-warehouse stock records into the
/// availability view the POS and the transfer form consume.
///
/// Deliberately side-effect free and never cached; any to-be-acted-upon
/// decision re-checks under the record lock at act time (see
/// [`crate::stock::StockStore::reserve`]).
pub struct StockAggregatorService {
    store: Arc<StockStore>,
    warehouses: Arc<WarehouseService>,
    catalog: Arc<VariantCatalog>,
    allow_sale_without_stock: bool,
}

impl StockAggregatorService {
    pub fn new(
        store: Arc<StockStore>,
        warehouses: Arc<WarehouseService>,
        catalog: Arc<VariantCatalog>,
        allow_sale_without_stock: bool,
    ) -> Self {
        Self {
            store,
            warehouses,
            catalog,
            allow_sale_without_stock,
        }
    }

    #[instrument(skip(self))]
    pub async fn availability(&self, variant_id: Uuid) -> Result<StockAvailability, ServiceError> {
        let variant = self.catalog.get(variant_id)?;
        let records = self.store.records_for_variant(variant_id).await;

        let mut total_available = Decimal::ZERO;
        let mut total_reserved = Decimal::ZERO;
        let mut entries = Vec::with_capacity(records.len());

        for (warehouse_id, record) in records {
            let warehouse = match self.warehouses.get(warehouse_id) {
                Ok(w) => w,
                Err(_) => {
                    warn!(%warehouse_id, "stock record references unknown warehouse, skipping");
                    continue;
                }
            };
            total_available += record.quantity_available;
            total_reserved += record.quantity_reserved;

            let status = classify(
                record.quantity_available,
                variant.min_stock_level,
                variant.max_stock_level,
            );
            let can_sell_from_here = (warehouse.is_point_of_sale
                && record.quantity_available > Decimal::ZERO)
                || self.allow_sale_without_stock;

            entries.push(WarehouseStockEntry {
                warehouse_id,
                warehouse_name: warehouse.name,
                is_point_of_sale: warehouse.is_point_of_sale,
                available: record.quantity_available,
                reserved: record.quantity_reserved,
                status,
                can_sell_from_here,
                percentage: 0, // filled in once the total is known
            });
        }

        for entry in &mut entries {
            entry.percentage = percentage_of(entry.available, total_available);
        }

        let can_sell = self.allow_sale_without_stock
            || entries
                .iter()
                .any(|e| e.is_point_of_sale && e.available > Decimal::ZERO);

        let max_sellable_quantity = entries
            .iter()
            .filter(|e| e.can_sell_from_here && e.available > Decimal::ZERO)
            .map(|e| e.available)
            .sum();

        let suggested_warehouse = suggest(&entries, self.allow_sale_without_stock);

        Ok(StockAvailability {
            variant_id,
            total_system: total_available + total_reserved,
            total_available,
            total_reserved,
            can_sell,
            max_sellable_quantity,
            suggested_warehouse,
            by_warehouse: entries,
            computed_at: Utc::now(),
        })
    }
}

fn classify(available: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> StockStatus {
    if available.is_zero() {
        return StockStatus::SinStock;
    }
    if let Some(min) = min {
        if available < min {
            return StockStatus::BajoMinimo;
        }
    }
    if let Some(max) = max {
        if available > max {
            return StockStatus::SobreMaximo;
        }
    }
    StockStatus::Normal
}

fn percentage_of(part: Decimal, total: Decimal) -> u32 {
    if total.is_zero() {
        return 0;
    }
    (part / total * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// Point of sale with the highest available stock; ties break toward the
/// lowest warehouse id. In back-order mode an empty point of sale still
/// qualifies, since it may sell regardless.
fn suggest(entries: &[WarehouseStockEntry], allow_without_stock: bool) -> Option<SuggestedWarehouse> {
    entries
        .iter()
        .filter(|e| e.is_point_of_sale)
        .filter(|e| allow_without_stock || e.available > Decimal::ZERO)
        .fold(None::<&WarehouseStockEntry>, |best, e| match best {
            None => Some(e),
            Some(b) if e.available > b.available => Some(e),
            Some(b) if e.available == b.available && e.warehouse_id < b.warehouse_id => Some(e),
            Some(b) => Some(b),
        })
        .map(|e| SuggestedWarehouse {
            warehouse_id: e.warehouse_id,
            warehouse_name: e.warehouse_name.clone(),
            available: e.available,
            reason: "highest available stock".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    #[test_case(dec!(0), None, None => StockStatus::SinStock; "zero is sin_stock")]
    #[test_case(dec!(3), Some(dec!(5)), None => StockStatus::BajoMinimo; "below minimum")]
    #[test_case(dec!(80), None, Some(dec!(50)) => StockStatus::SobreMaximo; "above maximum")]
    #[test_case(dec!(10), Some(dec!(5)), Some(dec!(50)) => StockStatus::Normal; "inside band")]
    #[test_case(dec!(5), Some(dec!(5)), None => StockStatus::Normal; "at minimum is normal")]
    fn classification(available: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> StockStatus {
        classify(available, min, max)
    }

    #[test]
    fn percentages_round_half_away_from_zero() {
        assert_eq!(percentage_of(dec!(20), dec!(30)), 67);
        assert_eq!(percentage_of(dec!(10), dec!(30)), 33);
        assert_eq!(percentage_of(dec!(1), dec!(200)), 1);
        assert_eq!(percentage_of(dec!(5), Decimal::ZERO), 0);
    }
}
