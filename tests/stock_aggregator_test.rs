mod common;

use bodega_api::config::AppConfig;
use bodega_api::models::StockKey;
use bodega_api::services::catalog::ThresholdUpdate;
use bodega_api::services::stock::AdjustStock;
use bodega_api::services::stock_aggregator::StockStatus;
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// The worked distribution example: a POS with 20 available / 5 reserved and
/// a plain warehouse with 10 available.
#[tokio::test]
async fn aggregates_totals_percentages_and_suggestion() {
    let state = spawn_state().await;
    let variant = register_variant(&state, "SKU-AGG");
    let wh1 = create_warehouse(&state, "WH1", true).await;
    let wh2 = create_warehouse(&state, "WH2", false).await;

    seed_stock(&state, variant.id, wh1.id, dec!(25)).await;
    seed_stock(&state, variant.id, wh2.id, dec!(10)).await;
    // Same reservation primitive the checkout flow uses.
    state
        .services
        .store
        .reserve(StockKey::new(variant.id, wh1.id), dec!(5))
        .await
        .unwrap();

    let snapshot = state.services.aggregator.availability(variant.id).await.unwrap();

    assert_eq!(snapshot.total_available, dec!(30));
    assert_eq!(snapshot.total_reserved, dec!(5));
    assert_eq!(snapshot.total_system, dec!(35));
    assert!(snapshot.can_sell);
    assert_eq!(snapshot.max_sellable_quantity, dec!(20));

    let suggested = snapshot.suggested_warehouse.as_ref().expect("a POS with stock");
    assert_eq!(suggested.warehouse_id, wh1.id);
    assert_eq!(suggested.reason, "highest available stock");

    let entry1 = snapshot
        .by_warehouse
        .iter()
        .find(|e| e.warehouse_id == wh1.id)
        .unwrap();
    let entry2 = snapshot
        .by_warehouse
        .iter()
        .find(|e| e.warehouse_id == wh2.id)
        .unwrap();
    assert_eq!(entry1.percentage, 67);
    assert_eq!(entry2.percentage, 33);
    assert!(entry1.can_sell_from_here);
    assert!(!entry2.can_sell_from_here, "not a point of sale");
    assert_eq!(entry1.reserved, dec!(5));
}

#[tokio::test]
async fn zero_records_yield_zero_totals_and_backorder_controls_can_sell() {
    let state = spawn_state().await;
    let variant = register_variant(&state, "SKU-EMPTY");

    let snapshot = state.services.aggregator.availability(variant.id).await.unwrap();
    assert_eq!(snapshot.total_system, Decimal::ZERO);
    assert_eq!(snapshot.total_available, Decimal::ZERO);
    assert!(!snapshot.can_sell);
    assert!(snapshot.by_warehouse.is_empty());
    assert!(snapshot.suggested_warehouse.is_none());

    // Back-order mode flips system-wide eligibility even with no records.
    let state = spawn_state_with(AppConfig {
        allow_sale_without_stock: true,
        ..AppConfig::default()
    })
    .await;
    let variant = register_variant(&state, "SKU-EMPTY");
    let snapshot = state.services.aggregator.availability(variant.id).await.unwrap();
    assert!(snapshot.can_sell);
}

#[tokio::test]
async fn unknown_variant_is_not_found() {
    let state = spawn_state().await;
    let err = state
        .services
        .aggregator
        .availability(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, bodega_api::errors::ServiceError::NotFound(_)));
}

#[tokio::test]
async fn status_tags_follow_the_configured_thresholds() {
    let state = spawn_state().await;
    let variant = register_variant(&state, "SKU-THRESH");
    state
        .services
        .catalog
        .set_thresholds(
            variant.id,
            ThresholdUpdate {
                min_stock_level: Some(dec!(5)),
                max_stock_level: Some(dec!(50)),
            },
        )
        .unwrap();

    let wh_low = create_warehouse(&state, "WH-LOW", true).await;
    let wh_high = create_warehouse(&state, "WH-HIGH", false).await;
    let wh_zero = create_warehouse(&state, "WH-ZERO", false).await;

    seed_stock(&state, variant.id, wh_low.id, dec!(3)).await;
    seed_stock(&state, variant.id, wh_high.id, dec!(80)).await;
    seed_stock(&state, variant.id, wh_zero.id, dec!(4)).await;
    state
        .services
        .stock
        .adjust_stock(AdjustStock {
            variant_id: variant.id,
            warehouse_id: wh_zero.id,
            new_available: Decimal::ZERO,
            reason: "cycle count".into(),
        })
        .await
        .unwrap();

    let snapshot = state.services.aggregator.availability(variant.id).await.unwrap();
    let status_of = |id| {
        snapshot
            .by_warehouse
            .iter()
            .find(|e| e.warehouse_id == id)
            .unwrap()
            .status
    };
    assert_eq!(status_of(wh_low.id), StockStatus::BajoMinimo);
    assert_eq!(status_of(wh_high.id), StockStatus::SobreMaximo);
    assert_eq!(status_of(wh_zero.id), StockStatus::SinStock);
}

/// The snapshot is recomputed from live records, never cached.
#[tokio::test]
async fn snapshot_reflects_mutations_immediately() {
    let state = spawn_state().await;
    let variant = register_variant(&state, "SKU-LIVE");
    let wh = create_warehouse(&state, "WH-LIVE", true).await;
    seed_stock(&state, variant.id, wh.id, dec!(10)).await;

    let before = state.services.aggregator.availability(variant.id).await.unwrap();
    assert_eq!(before.total_available, dec!(10));

    state
        .services
        .store
        .reserve(StockKey::new(variant.id, wh.id), dec!(4))
        .await
        .unwrap();

    let after = state.services.aggregator.availability(variant.id).await.unwrap();
    assert_eq!(after.total_available, dec!(6));
    assert_eq!(after.total_reserved, dec!(4));
    assert_eq!(after.total_system, dec!(10));
}
