use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Identity of a stock record: one row per (variant, warehouse) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub variant_id: Uuid,
    pub warehouse_id: Uuid,
}

impl StockKey {
    pub fn new(variant_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            variant_id,
            warehouse_id,
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant {} @ warehouse {}", self.variant_id, self.warehouse_id)
    }
}

/// Per-(variant, warehouse) quantities. `quantity_available` is free to sell
/// or transfer; `quantity_reserved` is earmarked for an in-flight transfer or
/// unconfirmed sale. Both fields stay >= 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StockRecord {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantity_available: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantity_reserved: Decimal,
}

impl StockRecord {
    pub fn new(available: Decimal, reserved: Decimal) -> Self {
        Self {
            quantity_available: available,
            quantity_reserved: reserved,
        }
    }

    /// Total physically present at the warehouse, sold or not.
    pub fn total(&self) -> Decimal {
        self.quantity_available + self.quantity_reserved
    }

    /// True when the record carries no stock and is eligible for pruning.
    pub fn is_empty(&self) -> bool {
        self.quantity_available.is_zero() && self.quantity_reserved.is_zero()
    }
}

/// Deserializes a quantity from a number or string, coercing malformed or
/// legacy values to zero instead of failing the whole payload.
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientDecimal;

    impl<'de> serde::de::Visitor<'de> for LenientDecimal {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a decimal quantity as a number or string")
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Decimal, E> {
            Ok(v.trim().parse().unwrap_or(Decimal::ZERO))
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Decimal, E> {
            Ok(Decimal::from_f64(v).unwrap_or(Decimal::ZERO))
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Decimal, E> {
            Ok(Decimal::ZERO)
        }
    }

    deserializer.deserialize_any(LenientDecimal)
}
