pub mod approvals;
pub mod catalog;
pub mod stock;
pub mod stock_aggregator;
pub mod transfers;
pub mod warehouses;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::stock::{RetryPolicy, StockStore};

/// Shared service graph handed to the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<StockStore>,
    pub catalog: Arc<catalog::VariantCatalog>,
    pub warehouses: Arc<warehouses::WarehouseService>,
    pub stock: Arc<stock::StockService>,
    pub aggregator: Arc<stock_aggregator::StockAggregatorService>,
    pub transfers: Arc<transfers::TransferService>,
    pub approvals: Arc<approvals::ApprovalService>,
}

impl AppServices {
    pub fn new(config: &AppConfig, event_sender: EventSender) -> Self {
        let store = Arc::new(StockStore::new(RetryPolicy {
            max_attempts: config.lock_retry_attempts,
            backoff_ms: config.lock_retry_backoff_ms,
        }));
        let catalog = Arc::new(catalog::VariantCatalog::new());
        let warehouses = Arc::new(warehouses::WarehouseService::new(
            store.clone(),
            event_sender.clone(),
        ));
        let stock = Arc::new(stock::StockService::new(
            store.clone(),
            warehouses.clone(),
            catalog.clone(),
            event_sender.clone(),
        ));
        let aggregator = Arc::new(stock_aggregator::StockAggregatorService::new(
            store.clone(),
            warehouses.clone(),
            catalog.clone(),
            config.allow_sale_without_stock,
        ));
        let transfers = Arc::new(transfers::TransferService::new(
            store.clone(),
            warehouses.clone(),
            catalog.clone(),
            event_sender.clone(),
        ));
        let approvals = Arc::new(approvals::ApprovalService::new(event_sender));

        Self {
            store,
            catalog,
            warehouses,
            stock,
            aggregator,
            transfers,
            approvals,
        }
    }
}
