use axum::Json;
use utoipa::OpenApi;

/// OpenAPI description of the stock coordination surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bodega-api",
        description = "Multi-warehouse stock ledger and transfer workflow"
    ),
    paths(
        crate::handlers::warehouses::list_warehouses,
        crate::handlers::warehouses::create_warehouse,
        crate::handlers::warehouses::get_warehouse,
        crate::handlers::warehouses::update_warehouse,
        crate::handlers::warehouses::deactivate_warehouse,
        crate::handlers::warehouses::reactivate_warehouse,
        crate::handlers::variants::list_variants,
        crate::handlers::variants::register_variant,
        crate::handlers::variants::get_variant,
        crate::handlers::variants::set_thresholds,
        crate::handlers::variants::availability,
        crate::handlers::stock::receive_stock,
        crate::handlers::stock::adjust_stock,
        crate::handlers::transfers::create_transfer,
        crate::handlers::transfers::list_transfers,
        crate::handlers::transfers::get_transfer,
        crate::handlers::transfers::approve_transfer,
        crate::handlers::transfers::receive_transfer,
        crate::handlers::transfers::cancel_transfer,
        crate::handlers::approvals::list_pending,
        crate::handlers::approvals::submit_approval,
        crate::handlers::approvals::refresh_queue,
        crate::handlers::approvals::resolve_approval,
        crate::handlers::approvals::mark_disconnected,
        crate::handlers::approvals::reconnect,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::models::Warehouse,
        crate::models::ProductVariant,
        crate::models::StockRecord,
        crate::models::Transfer,
        crate::models::TransferStatus,
        crate::models::TransferTransition,
        crate::models::PendingApproval,
        crate::models::ApprovalDecision,
        crate::services::stock_aggregator::StockAvailability,
        crate::services::stock_aggregator::WarehouseStockEntry,
        crate::services::stock_aggregator::SuggestedWarehouse,
        crate::services::stock_aggregator::StockStatus,
    )),
    tags(
        (name = "warehouses", description = "Warehouse registry"),
        (name = "variants", description = "Variant catalog and availability"),
        (name = "stock", description = "Stock intake and adjustment"),
        (name = "transfers", description = "Inter-warehouse transfer workflow"),
        (name = "approvals", description = "Remote-approval channel")
    )
)]
pub struct ApiDoc;

/// Serves the raw document at `/api-docs/openapi.json`.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
