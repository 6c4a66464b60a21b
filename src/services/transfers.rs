use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{StockKey, Transfer, TransferStatus};
use crate::services::catalog::VariantCatalog;
use crate::services::warehouses::WarehouseService;
use crate::stock::StockStore;

lazy_static! {
    static ref TRANSFERS_CREATED: IntCounter = register_int_counter!(
        "transfers_created_total",
        "Total number of transfers admitted"
    )
    .expect("metric can be created");
    static ref TRANSFER_FAILURES: IntCounterVec = register_int_counter_vec!(
        "transfer_failures_total",
        "Total number of rejected transfer operations",
        &["error_type"]
    )
    .expect("metric can be created");
    static ref TRANSFERS_COMPLETED: IntCounter = register_int_counter!(
        "transfers_completed_total",
        "Total number of transfers received at destination"
    )
    .expect("metric can be created");
    static ref TRANSFERS_CANCELLED: IntCounter = register_int_counter!(
        "transfers_cancelled_total",
        "Total number of transfers cancelled"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransfer {
    pub variant_id: Uuid,
    pub source_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    #[validate(length(min = 1, max = 100))]
    pub requested_by: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub variant_id: Option<Uuid>,
    /// Matches either endpoint of the transfer.
    pub warehouse_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferPage {
    pub transfers: Vec<Transfer>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Owns Transfer entities and drives them through their lifecycle.
///
/// Admission validates against availability inside the same critical section
/// that reserves the stock, so no concurrent caller can be admitted against
/// quantities this one already claimed. After admission every further
/// failure is a state-transition violation, never stock arithmetic: the
/// reservation already removed the ambiguity.
pub struct TransferService {
    store: Arc<StockStore>,
    warehouses: Arc<WarehouseService>,
    catalog: Arc<VariantCatalog>,
    event_sender: EventSender,
    ledger: DashMap<Uuid, Arc<Mutex<Transfer>>>,
}

impl TransferService {
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
            ledger: DashMap::new(),
        }
    }

    #[instrument(skip(self, cmd), fields(variant_id = %cmd.variant_id))]
    pub async fn create(&self, cmd: CreateTransfer) -> Result<Transfer, ServiceError> {
        self.validate_create(&cmd).map_err(|e| {
            TRANSFER_FAILURES.with_label_values(&["validation"]).inc();
            e
        })?;

        // Availability check and reservation are one atomic unit under the
        // source record's lock; a failed reservation changes nothing.
        let source_key = StockKey::new(cmd.variant_id, cmd.source_warehouse_id);
        let record = self
            .store
            .reserve(source_key, cmd.quantity)
            .await
            .map_err(|e| {
                TRANSFER_FAILURES.with_label_values(&["insufficient_stock"]).inc();
                e
            })?;

        let transfer = Transfer::new(
            cmd.variant_id,
            cmd.source_warehouse_id,
            cmd.destination_warehouse_id,
            cmd.quantity,
            cmd.reason,
            cmd.requested_by,
        );
        self.ledger
            .insert(transfer.id, Arc::new(Mutex::new(transfer.clone())));

        info!(
            transfer_id = %transfer.id,
            quantity = %transfer.quantity,
            source_available = %record.quantity_available,
            "transfer admitted"
        );
        TRANSFERS_CREATED.inc();
        self.emit(Event::TransferCreated {
            transfer_id: transfer.id,
            variant_id: transfer.variant_id,
            source_warehouse_id: transfer.source_warehouse_id,
            destination_warehouse_id: transfer.destination_warehouse_id,
            quantity: transfer.quantity,
        })
        .await;
        Ok(transfer)
    }

    fn validate_create(&self, cmd: &CreateTransfer) -> Result<(), ServiceError> {
        cmd.validate()?;
        if cmd.reason.trim().is_empty() {
            return Err(ServiceError::validation("transfer reason is required"));
        }
        if cmd.quantity <= Decimal::ZERO {
            return Err(ServiceError::validation("quantity must be positive"));
        }
        if cmd.source_warehouse_id == cmd.destination_warehouse_id {
            return Err(ServiceError::validation(
                "source and destination warehouses must differ",
            ));
        }
        self.catalog.require(cmd.variant_id)?;
        self.warehouses.require_active(cmd.source_warehouse_id)?;
        self.warehouses.require_active(cmd.destination_warehouse_id)?;
        Ok(())
    }

    /// pending -> in_transit: the stock was picked and dispatched. Nothing
    /// moves between pools here; the reservation from admission stands.
    /// Re-approving an in-transit transfer is a no-op success.
    #[instrument(skip(self))]
    pub async fn approve(&self, transfer_id: Uuid, actor: &str) -> Result<Transfer, ServiceError> {
        require_actor(actor)?;
        let handle = self.handle(transfer_id)?;
        let mut transfer = handle.lock().await;
        match transfer.status {
            TransferStatus::Pending => {
                transfer.transition(TransferStatus::InTransit, actor, None);
                let snapshot = transfer.clone();
                drop(transfer);
                self.emit(Event::TransferApproved {
                    transfer_id,
                    actor: actor.to_string(),
                })
                .await;
                Ok(snapshot)
            }
            TransferStatus::InTransit => Ok(transfer.clone()),
            from => {
                TRANSFER_FAILURES.with_label_values(&["invalid_transition"]).inc();
                Err(ServiceError::InvalidStateTransition {
                    from,
                    action: "approve",
                })
            }
        }
    }

    /// in_transit -> completed: the reservation at the source is consumed
    /// and the quantity lands in the destination's available pool.
    /// Re-receiving a completed transfer is a no-op success.
    #[instrument(skip(self))]
    pub async fn receive(&self, transfer_id: Uuid, actor: &str) -> Result<Transfer, ServiceError> {
        require_actor(actor)?;
        let handle = self.handle(transfer_id)?;
        let mut transfer = handle.lock().await;
        match transfer.status {
            TransferStatus::InTransit => {
                // A destination deactivated mid-flight cannot receive stock;
                // the transfer stays in transit until cancelled or the
                // warehouse is reactivated.
                self.warehouses.require_active(transfer.destination_warehouse_id)?;
                self.store
                    .transfer_reserved(
                        transfer.variant_id,
                        transfer.source_warehouse_id,
                        transfer.destination_warehouse_id,
                        transfer.quantity,
                    )
                    .await?;
                transfer.transition(TransferStatus::Completed, actor, None);
                let snapshot = transfer.clone();
                drop(transfer);
                TRANSFERS_COMPLETED.inc();
                self.emit(Event::TransferReceived {
                    transfer_id,
                    actor: actor.to_string(),
                })
                .await;
                Ok(snapshot)
            }
            TransferStatus::Completed => Ok(transfer.clone()),
            from => {
                TRANSFER_FAILURES.with_label_values(&["invalid_transition"]).inc();
                Err(ServiceError::InvalidStateTransition {
                    from,
                    action: "receive",
                })
            }
        }
    }

    /// pending|in_transit -> cancelled: the reservation flows back into the
    /// source's available pool. Re-cancelling a cancelled transfer is a
    /// no-op success; cancelling a completed one is invalid.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        transfer_id: Uuid,
        actor: &str,
        reason: Option<String>,
    ) -> Result<Transfer, ServiceError> {
        require_actor(actor)?;
        let handle = self.handle(transfer_id)?;
        let mut transfer = handle.lock().await;
        match transfer.status {
            TransferStatus::Pending | TransferStatus::InTransit => {
                self.store
                    .release(
                        StockKey::new(transfer.variant_id, transfer.source_warehouse_id),
                        transfer.quantity,
                    )
                    .await?;
                transfer.transition(TransferStatus::Cancelled, actor, reason.clone());
                let snapshot = transfer.clone();
                drop(transfer);
                TRANSFERS_CANCELLED.inc();
                self.emit(Event::TransferCancelled {
                    transfer_id,
                    actor: actor.to_string(),
                    reason,
                })
                .await;
                Ok(snapshot)
            }
            TransferStatus::Cancelled => Ok(transfer.clone()),
            from => {
                TRANSFER_FAILURES.with_label_values(&["invalid_transition"]).inc();
                Err(ServiceError::InvalidStateTransition {
                    from,
                    action: "cancel",
                })
            }
        }
    }

    pub async fn get(&self, transfer_id: Uuid) -> Result<Transfer, ServiceError> {
        let handle = self.handle(transfer_id)?;
        let transfer = handle.lock().await;
        Ok(transfer.clone())
    }

    /// Transfer history, newest first, filterable by status, variant, or
    /// either warehouse endpoint.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: TransferFilter) -> Result<TransferPage, ServiceError> {
        let page = filter.page.unwrap_or(1).max(1);
        let limit = filter.limit.unwrap_or(20).clamp(1, 100);

        let handles: Vec<Arc<Mutex<Transfer>>> = self
            .ledger
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut transfers = Vec::with_capacity(handles.len());
        for handle in handles {
            let transfer = handle.lock().await;
            let keep = filter.status.map_or(true, |s| transfer.status == s)
                && filter.variant_id.map_or(true, |v| transfer.variant_id == v)
                && filter.warehouse_id.map_or(true, |w| {
                    transfer.source_warehouse_id == w || transfer.destination_warehouse_id == w
                });
            if keep {
                transfers.push(transfer.clone());
            }
        }

        transfers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = transfers.len() as u64;
        let start = ((page - 1) * limit) as usize;
        let transfers: Vec<Transfer> = transfers
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        Ok(TransferPage {
            transfers,
            total,
            page,
            limit,
        })
    }

    fn handle(&self, transfer_id: Uuid) -> Result<Arc<Mutex<Transfer>>, ServiceError> {
        self.ledger
            .get(&transfer_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::not_found(format!("transfer {} not found", transfer_id)))
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "event publication failed");
        }
    }
}

fn require_actor(actor: &str) -> Result<(), ServiceError> {
    if actor.trim().is_empty() {
        return Err(ServiceError::validation("actor is required"));
    }
    Ok(())
}
