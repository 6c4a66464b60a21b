use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::warehouses::{NewWarehouse, WarehouseUpdate};
use crate::{ApiResponse, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/:id", get(get_warehouse).put(update_warehouse))
        .route("/:id/deactivate", post(deactivate_warehouse))
        .route("/:id/reactivate", post(reactivate_warehouse))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WarehouseListQuery {
    /// Restrict to active warehouses.
    #[serde(default)]
    pub active: bool,
}

/// List warehouses
#[utoipa::path(
    get,
    path = "/api/v1/warehouses",
    params(WarehouseListQuery),
    responses((status = 200, description = "Warehouse list"))
)]
pub async fn list_warehouses(
    State(state): State<AppState>,
    Query(query): Query<WarehouseListQuery>,
) -> impl IntoResponse {
    let warehouses = state.services.warehouses.list(query.active);
    Json(ApiResponse::ok(warehouses))
}

/// Register a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/warehouses",
    request_body = NewWarehouse,
    responses(
        (status = 201, description = "Warehouse created", body = crate::models::Warehouse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    )
)]
pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(payload): Json<NewWarehouse>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.warehouses.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(warehouse))))
}

/// Fetch one warehouse
#[utoipa::path(
    get,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse id")),
    responses(
        (status = 200, description = "Warehouse", body = crate::models::Warehouse),
        (status = 404, description = "Unknown warehouse", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.warehouses.get(id)?;
    Ok(Json(ApiResponse::ok(warehouse)))
}

/// Update name, address, or point-of-sale flag
#[utoipa::path(
    put,
    path = "/api/v1/warehouses/{id}",
    params(("id" = Uuid, Path, description = "Warehouse id")),
    request_body = WarehouseUpdate,
    responses((status = 200, description = "Warehouse updated", body = crate::models::Warehouse))
)]
pub async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WarehouseUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.warehouses.update(id, payload)?;
    Ok(Json(ApiResponse::ok(warehouse)))
}

/// Deactivate a warehouse (refused while it holds stock)
#[utoipa::path(
    post,
    path = "/api/v1/warehouses/{id}/deactivate",
    params(("id" = Uuid, Path, description = "Warehouse id")),
    responses(
        (status = 200, description = "Warehouse deactivated", body = crate::models::Warehouse),
        (status = 400, description = "Warehouse still holds stock", body = crate::errors::ErrorResponse)
    )
)]
pub async fn deactivate_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.warehouses.deactivate(id).await?;
    Ok(Json(ApiResponse::ok(warehouse)))
}

/// Reactivate a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/warehouses/{id}/reactivate",
    params(("id" = Uuid, Path, description = "Warehouse id")),
    responses((status = 200, description = "Warehouse reactivated", body = crate::models::Warehouse))
)]
pub async fn reactivate_warehouse(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let warehouse = state.services.warehouses.reactivate(id).await?;
    Ok(Json(ApiResponse::ok(warehouse)))
}
