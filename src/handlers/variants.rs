use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::catalog::{RegisterVariant, ThresholdUpdate};
use crate::{ApiResponse, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_variants).post(register_variant))
        .route("/:id", get(get_variant))
        .route("/:id/thresholds", put(set_thresholds))
        .route("/:id/availability", get(availability))
}

/// List registered variants
#[utoipa::path(
    get,
    path = "/api/v1/variants",
    responses((status = 200, description = "Variant list"))
)]
pub async fn list_variants(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.services.catalog.list()))
}

/// Register a variant with the stock coordinator
#[utoipa::path(
    post,
    path = "/api/v1/variants",
    request_body = RegisterVariant,
    responses(
        (status = 201, description = "Variant registered", body = crate::models::ProductVariant),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    )
)]
pub async fn register_variant(
    State(state): State<AppState>,
    Json(payload): Json<RegisterVariant>,
) -> Result<impl IntoResponse, ServiceError> {
    let variant = state.services.catalog.register(payload)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(variant))))
}

/// Fetch one variant
#[utoipa::path(
    get,
    path = "/api/v1/variants/{id}",
    params(("id" = Uuid, Path, description = "Variant id")),
    responses(
        (status = 200, description = "Variant", body = crate::models::ProductVariant),
        (status = 404, description = "Unknown variant", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let variant = state.services.catalog.get(id)?;
    Ok(Json(ApiResponse::ok(variant)))
}

/// Set the min/max stock thresholds used for status classification
#[utoipa::path(
    put,
    path = "/api/v1/variants/{id}/thresholds",
    params(("id" = Uuid, Path, description = "Variant id")),
    request_body = ThresholdUpdate,
    responses((status = 200, description = "Thresholds updated", body = crate::models::ProductVariant))
)]
pub async fn set_thresholds(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ThresholdUpdate>,
) -> Result<impl IntoResponse, ServiceError> {
    let variant = state.services.catalog.set_thresholds(id, payload)?;
    Ok(Json(ApiResponse::ok(variant)))
}

/// Sale-ready availability snapshot across all warehouses
#[utoipa::path(
    get,
    path = "/api/v1/variants/{id}/availability",
    params(("id" = Uuid, Path, description = "Variant id")),
    responses(
        (status = 200, description = "Availability snapshot",
            body = crate::services::stock_aggregator::StockAvailability),
        (status = 404, description = "Unknown variant", body = crate::errors::ErrorResponse)
    )
)]
pub async fn availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let snapshot = state.services.aggregator.availability(id).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}
