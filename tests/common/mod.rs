#![allow(dead_code)]

use bodega_api::config::AppConfig;
use bodega_api::events;
use bodega_api::models::{ProductVariant, StockRecord, Warehouse};
use bodega_api::services::catalog::RegisterVariant;
use bodega_api::services::stock::ReceiveStock;
use bodega_api::services::warehouses::NewWarehouse;
use bodega_api::{build_state, AppState};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Builds a full service graph with the event processor running.
pub async fn spawn_state() -> AppState {
    spawn_state_with(AppConfig::default()).await
}

pub async fn spawn_state_with(config: AppConfig) -> AppState {
    let (state, event_rx) = build_state(config);
    tokio::spawn(events::process_events(event_rx, state.events_feed.clone()));
    state
}

pub fn register_variant(state: &AppState, sku: &str) -> ProductVariant {
    state
        .services
        .catalog
        .register(RegisterVariant {
            product_id: Uuid::new_v4(),
            sku: sku.into(),
            color: None,
            size: None,
            material: None,
            min_stock_level: None,
            max_stock_level: None,
        })
        .expect("variant registers")
}

pub async fn create_warehouse(state: &AppState, code: &str, is_pos: bool) -> Warehouse {
    state
        .services
        .warehouses
        .create(NewWarehouse {
            code: code.into(),
            name: format!("Bodega {}", code),
            address: None,
            is_point_of_sale: is_pos,
        })
        .await
        .expect("warehouse registers")
}

pub async fn seed_stock(state: &AppState, variant_id: Uuid, warehouse_id: Uuid, quantity: Decimal) {
    state
        .services
        .stock
        .receive_stock(ReceiveStock {
            variant_id,
            warehouse_id,
            quantity,
            reference: Some("seed".into()),
        })
        .await
        .expect("stock seeds");
}

/// Current record for the pair, zeroed when absent.
pub async fn record(state: &AppState, variant_id: Uuid, warehouse_id: Uuid) -> StockRecord {
    state
        .services
        .store
        .records_for_variant(variant_id)
        .await
        .into_iter()
        .find(|(w, _)| *w == warehouse_id)
        .map(|(_, r)| r)
        .unwrap_or_default()
}

/// System-wide available+reserved for the variant across all warehouses.
pub async fn grand_total(state: &AppState, variant_id: Uuid) -> Decimal {
    state
        .services
        .store
        .records_for_variant(variant_id)
        .await
        .iter()
        .map(|(_, r)| r.total())
        .sum()
}
