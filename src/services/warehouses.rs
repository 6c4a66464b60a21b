use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::Warehouse;
use crate::stock::StockStore;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewWarehouse {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub address: Option<String>,
    #[serde(default)]
    pub is_point_of_sale: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WarehouseUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_point_of_sale: Option<bool>,
}

/// Registry of stock-holding locations. Warehouses are only ever
/// deactivated, never removed, and deactivation is refused while the
/// warehouse still holds stock.
pub struct WarehouseService {
    warehouses: DashMap<Uuid, Warehouse>,
    stock: Arc<StockStore>,
    event_sender: EventSender,
}

impl WarehouseService {
    pub fn new(stock: Arc<StockStore>, event_sender: EventSender) -> Self {
        Self {
            warehouses: DashMap::new(),
            stock,
            event_sender,
        }
    }

    #[instrument(skip(self, cmd), fields(code = %cmd.code))]
    pub async fn create(&self, cmd: NewWarehouse) -> Result<Warehouse, ServiceError> {
        cmd.validate()?;
        if self
            .warehouses
            .iter()
            .any(|entry| entry.value().code == cmd.code)
        {
            return Err(ServiceError::validation(format!(
                "warehouse code {} already in use",
                cmd.code
            )));
        }

        let warehouse = Warehouse::new(cmd.code, cmd.name, cmd.address, cmd.is_point_of_sale);
        self.warehouses.insert(warehouse.id, warehouse.clone());
        info!(warehouse_id = %warehouse.id, code = %warehouse.code, "warehouse created");
        self.emit(Event::WarehouseCreated(warehouse.id)).await;
        Ok(warehouse)
    }

    #[instrument(skip(self, update))]
    pub fn update(&self, id: Uuid, update: WarehouseUpdate) -> Result<Warehouse, ServiceError> {
        let mut entry = self
            .warehouses
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(format!("warehouse {} not found", id)))?;
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(ServiceError::validation("warehouse name cannot be empty"));
            }
            entry.name = name;
        }
        if let Some(address) = update.address {
            entry.address = Some(address);
        }
        if let Some(is_pos) = update.is_point_of_sale {
            entry.is_point_of_sale = is_pos;
        }
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    /// Deactivation is refused while any stock record for the warehouse has
    /// a nonzero pool. Already-inactive warehouses deactivate as a no-op.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<Warehouse, ServiceError> {
        let warehouse = self.get(id)?;
        if !warehouse.active {
            return Ok(warehouse);
        }
        if self.stock.warehouse_holds_stock(id).await {
            return Err(ServiceError::validation(format!(
                "warehouse {} still holds stock and cannot be deactivated",
                warehouse.code
            )));
        }
        let mut entry = self
            .warehouses
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(format!("warehouse {} not found", id)))?;
        entry.active = false;
        entry.updated_at = Utc::now();
        let warehouse = entry.value().clone();
        drop(entry);
        self.emit(Event::WarehouseDeactivated(id)).await;
        Ok(warehouse)
    }

    #[instrument(skip(self))]
    pub async fn reactivate(&self, id: Uuid) -> Result<Warehouse, ServiceError> {
        let mut entry = self
            .warehouses
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(format!("warehouse {} not found", id)))?;
        let was_inactive = !entry.active;
        entry.active = true;
        entry.updated_at = Utc::now();
        let warehouse = entry.value().clone();
        drop(entry);
        if was_inactive {
            self.emit(Event::WarehouseReactivated(id)).await;
        }
        Ok(warehouse)
    }

    pub fn get(&self, id: Uuid) -> Result<Warehouse, ServiceError> {
        self.warehouses
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::not_found(format!("warehouse {} not found", id)))
    }

    /// Lookup used by the ledger: unknown ids are a not-found, inactive
    /// warehouses a validation failure the caller must resolve.
    pub fn require_active(&self, id: Uuid) -> Result<Warehouse, ServiceError> {
        let warehouse = self.get(id)?;
        if !warehouse.active {
            return Err(ServiceError::validation(format!(
                "warehouse {} is not active",
                warehouse.code
            )));
        }
        Ok(warehouse)
    }

    pub fn list(&self, active_only: bool) -> Vec<Warehouse> {
        let mut warehouses: Vec<Warehouse> = self
            .warehouses
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|w| !active_only || w.active)
            .collect();
        warehouses.sort_by(|a, b| a.code.cmp(&b.code));
        warehouses
    }

    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            warn!(error = %e, "event publication failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockKey;
    use crate::stock::RetryPolicy;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn service() -> (WarehouseService, Arc<StockStore>, mpsc::Receiver<Event>) {
        let store = Arc::new(StockStore::new(RetryPolicy::default()));
        let (tx, rx) = mpsc::channel(64);
        (
            WarehouseService::new(store.clone(), EventSender::new(tx)),
            store,
            rx,
        )
    }

    fn new_warehouse(code: &str) -> NewWarehouse {
        NewWarehouse {
            code: code.into(),
            name: format!("Bodega {}", code),
            address: None,
            is_point_of_sale: false,
        }
    }

    #[tokio::test]
    async fn deactivation_is_refused_while_stock_remains() {
        let (service, store, _rx) = service();
        let warehouse = service.create(new_warehouse("BOD-1")).await.unwrap();
        store
            .receive(StockKey::new(Uuid::new_v4(), warehouse.id), dec!(5))
            .await
            .unwrap();

        let err = service.deactivate(warehouse.id).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("holds stock"));
        assert!(service.get(warehouse.id).unwrap().active);
    }

    #[tokio::test]
    async fn deactivation_succeeds_once_empty_and_is_idempotent() {
        let (service, _store, _rx) = service();
        let warehouse = service.create(new_warehouse("BOD-2")).await.unwrap();
        let deactivated = service.deactivate(warehouse.id).await.unwrap();
        assert!(!deactivated.active);
        // Second call is a no-op, not an error.
        let again = service.deactivate(warehouse.id).await.unwrap();
        assert!(!again.active);
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let (service, _store, _rx) = service();
        service.create(new_warehouse("BOD-3")).await.unwrap();
        let err = service.create(new_warehouse("BOD-3")).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn require_active_distinguishes_missing_from_inactive() {
        let (service, _store, _rx) = service();
        assert_matches!(
            service.require_active(Uuid::new_v4()).unwrap_err(),
            ServiceError::NotFound(_)
        );
        let warehouse = service.create(new_warehouse("BOD-4")).await.unwrap();
        service.deactivate(warehouse.id).await.unwrap();
        assert_matches!(
            service.require_active(warehouse.id).unwrap_err(),
            ServiceError::ValidationError(_)
        );
    }
}
