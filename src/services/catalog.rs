use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::ProductVariant;

/// Registration payload for a variant. Catalog CRUD proper lives in the
/// product service; this registry only carries what stock coordination
/// needs: identity plus the stock thresholds the availability view
/// classifies against.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterVariant {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub material: Option<String>,
    pub min_stock_level: Option<Decimal>,
    pub max_stock_level: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ThresholdUpdate {
    pub min_stock_level: Option<Decimal>,
    pub max_stock_level: Option<Decimal>,
}

/// In-process view of the catalog/product service.
#[derive(Default)]
pub struct VariantCatalog {
    variants: DashMap<Uuid, ProductVariant>,
}

impl VariantCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, cmd), fields(sku = %cmd.sku))]
    pub fn register(&self, cmd: RegisterVariant) -> Result<ProductVariant, ServiceError> {
        cmd.validate()?;
        check_thresholds(cmd.min_stock_level, cmd.max_stock_level)?;
        if self
            .variants
            .iter()
            .any(|entry| entry.value().sku == cmd.sku)
        {
            return Err(ServiceError::validation(format!(
                "variant with SKU {} already registered",
                cmd.sku
            )));
        }

        let mut variant = ProductVariant::new(cmd.product_id, cmd.sku);
        variant.color = cmd.color;
        variant.size = cmd.size;
        variant.material = cmd.material;
        variant.min_stock_level = cmd.min_stock_level;
        variant.max_stock_level = cmd.max_stock_level;

        self.variants.insert(variant.id, variant.clone());
        Ok(variant)
    }

    pub fn get(&self, variant_id: Uuid) -> Result<ProductVariant, ServiceError> {
        self.variants
            .get(&variant_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::not_found(format!("variant {} not found", variant_id)))
    }

    /// Existence check used by the ledger before touching stock.
    pub fn require(&self, variant_id: Uuid) -> Result<(), ServiceError> {
        self.get(variant_id).map(|_| ())
    }

    #[instrument(skip(self))]
    pub fn set_thresholds(
        &self,
        variant_id: Uuid,
        update: ThresholdUpdate,
    ) -> Result<ProductVariant, ServiceError> {
        check_thresholds(update.min_stock_level, update.max_stock_level)?;
        let mut entry = self
            .variants
            .get_mut(&variant_id)
            .ok_or_else(|| ServiceError::not_found(format!("variant {} not found", variant_id)))?;
        entry.min_stock_level = update.min_stock_level;
        entry.max_stock_level = update.max_stock_level;
        Ok(entry.value().clone())
    }

    pub fn list(&self) -> Vec<ProductVariant> {
        let mut variants: Vec<ProductVariant> =
            self.variants.iter().map(|entry| entry.value().clone()).collect();
        variants.sort_by(|a, b| a.sku.cmp(&b.sku));
        variants
    }
}

fn check_thresholds(min: Option<Decimal>, max: Option<Decimal>) -> Result<(), ServiceError> {
    if let Some(min) = min {
        if min < Decimal::ZERO {
            return Err(ServiceError::validation("min stock level cannot be negative"));
        }
    }
    if let Some(max) = max {
        if max < Decimal::ZERO {
            return Err(ServiceError::validation("max stock level cannot be negative"));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ServiceError::validation(
                "min stock level cannot exceed max stock level",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn register(catalog: &VariantCatalog, sku: &str) -> ProductVariant {
        catalog
            .register(RegisterVariant {
                product_id: Uuid::new_v4(),
                sku: sku.into(),
                color: None,
                size: None,
                material: None,
                min_stock_level: None,
                max_stock_level: None,
            })
            .unwrap()
    }

    #[test]
    fn duplicate_sku_is_rejected() {
        let catalog = VariantCatalog::new();
        register(&catalog, "TSHIRT-RED-M");
        let err = catalog
            .register(RegisterVariant {
                product_id: Uuid::new_v4(),
                sku: "TSHIRT-RED-M".into(),
                color: None,
                size: None,
                material: None,
                min_stock_level: None,
                max_stock_level: None,
            })
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let catalog = VariantCatalog::new();
        let variant = register(&catalog, "SKU-1");
        let err = catalog
            .set_thresholds(
                variant.id,
                ThresholdUpdate {
                    min_stock_level: Some(dec!(10)),
                    max_stock_level: Some(dec!(5)),
                },
            )
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn unknown_variant_is_not_found() {
        let catalog = VariantCatalog::new();
        assert_matches!(
            catalog.get(Uuid::new_v4()).unwrap_err(),
            ServiceError::NotFound(_)
        );
    }
}
