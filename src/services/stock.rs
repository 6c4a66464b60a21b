use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{StockKey, StockRecord};
use crate::services::catalog::VariantCatalog;
use crate::services::warehouses::WarehouseService;
use crate::stock::{PruneReport, StockStore};

lazy_static! {
    static ref STOCK_RECEIPTS: IntCounter = register_int_counter!(
        "stock_receipts_total",
        "Total number of stock-in movements"
    )
    .expect("metric can be created");
    static ref STOCK_ADJUSTMENTS: IntCounter = register_int_counter!(
        "stock_adjustments_total",
        "Total number of manual stock adjustments"
    )
    .expect("metric can be created");
    static ref STOCK_RECORDS_PRUNED: IntCounter = register_int_counter!(
        "stock_records_pruned_total",
        "Total number of empty stock records removed by maintenance"
    )
    .expect("metric can be created");
}

/// Stock-in movement: new quantity arriving at a warehouse from outside the
/// transfer workflow (supplier receipt, initial load, return to stock).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceiveStock {
    pub variant_id: Uuid,
    pub warehouse_id: Uuid,
    /// Lenient on purpose: legacy imports carry malformed quantities, which
    /// coerce to zero and then fail the positivity check cleanly.
    #[serde(deserialize_with = "crate::models::stock::lenient_decimal")]
    pub quantity: Decimal,
    #[validate(length(max = 200))]
    pub reference: Option<String>,
}

/// Audited manual correction of the available pool. Never touches the
/// reserved pool: reservations belong to in-flight transfers and sales.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustStock {
    pub variant_id: Uuid,
    pub warehouse_id: Uuid,
    pub new_available: Decimal,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}

/// Stock-in, adjustment, and record maintenance. These operations are the
/// only ways the system-wide available+reserved total for a variant changes;
/// transfer transitions just move quantity between warehouses.
pub struct StockService {
    store: Arc<StockStore>,
    warehouses: Arc<WarehouseService>,
    catalog: Arc<VariantCatalog>,
    event_sender: EventSender,
}

impl StockService {
    pub fn new(
        store: Arc<StockStore>,
        warehouses: Arc<WarehouseService>,
        catalog: Arc<VariantCatalog>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            store,
            warehouses,
            catalog,
            event_sender,
        }
    }

    #[instrument(skip(self, cmd), fields(variant_id = %cmd.variant_id, warehouse_id = %cmd.warehouse_id))]
    pub async fn receive_stock(&self, cmd: ReceiveStock) -> Result<StockRecord, ServiceError> {
        cmd.validate()?;
        if cmd.quantity <= Decimal::ZERO {
            return Err(ServiceError::validation("quantity must be positive"));
        }
        self.catalog.require(cmd.variant_id)?;
        self.warehouses.require_active(cmd.warehouse_id)?;

        let record = self
            .store
            .receive(StockKey::new(cmd.variant_id, cmd.warehouse_id), cmd.quantity)
            .await?;

        info!(
            quantity = %cmd.quantity,
            reference = cmd.reference.as_deref().unwrap_or("-"),
            "stock received"
        );
        STOCK_RECEIPTS.inc();
        self.emit(Event::StockReceived {
            variant_id: cmd.variant_id,
            warehouse_id: cmd.warehouse_id,
            quantity: cmd.quantity,
        })
        .await;
        Ok(record)
    }

    #[instrument(skip(self, cmd), fields(variant_id = %cmd.variant_id, warehouse_id = %cmd.warehouse_id))]
    pub async fn adjust_stock(&self, cmd: AdjustStock) -> Result<StockRecord, ServiceError> {
        cmd.validate()?;
        if cmd.reason.trim().is_empty() {
            return Err(ServiceError::validation("adjustment reason is required"));
        }
        if cmd.new_available < Decimal::ZERO {
            return Err(ServiceError::validation(
                "available quantity cannot be negative",
            ));
        }
        self.catalog.require(cmd.variant_id)?;
        // Adjustments are allowed on inactive warehouses: corrections may be
        // exactly what empties one out so it can be deactivated for good.
        self.warehouses.get(cmd.warehouse_id)?;

        let (old, record) = self
            .store
            .set_available(
                StockKey::new(cmd.variant_id, cmd.warehouse_id),
                cmd.new_available,
            )
            .await?;

        info!(old = %old, new = %cmd.new_available, reason = %cmd.reason, "stock adjusted");
        STOCK_ADJUSTMENTS.inc();
        self.emit(Event::StockAdjusted {
            variant_id: cmd.variant_id,
            warehouse_id: cmd.warehouse_id,
            old_quantity: old,
            new_quantity: cmd.new_available,
            reason: cmd.reason,
        })
        .await;
        Ok(record)
    }

    /// One maintenance pass over the store. Not exposed over the API; the
    /// background loop in `main` drives it.
    #[instrument(skip(self))]
    pub async fn prune_empty_records(&self) -> PruneReport {
        let report = self.store.prune_empty().await;
        for key in &report.removed {
            STOCK_RECORDS_PRUNED.inc();
            self.emit(Event::StockRecordPruned {
                variant_id: key.variant_id,
                warehouse_id: key.warehouse_id,
            })
            .await;
        }
        if !report.removed.is_empty() || report.busy > 0 {
            info!(
                removed = report.removed.len(),
                busy = report.busy,
                "stock record prune pass finished"
            );
        }
        report
    }

    /// Periodic maintenance loop; runs until the process shuts down.
    pub async fn maintenance_loop(self: Arc<Self>, every: Duration) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.prune_empty_records().await;
        }
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "event publication failed");
        }
    }
}
