use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::transfers::{CreateTransfer, TransferFilter};
use crate::{ApiResponse, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfers).post(create_transfer))
        .route("/:id", get(get_transfer))
        .route("/:id/approve", post(approve_transfer))
        .route("/:id/receive", post(receive_transfer))
        .route("/:id/cancel", post(cancel_transfer))
}

/// Actor performing a transfer transition, plus an optional note.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransferActionRequest {
    pub actor: String,
    pub reason: Option<String>,
}

/// Request an inter-warehouse transfer
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransfer,
    responses(
        (status = 201, description = "Transfer admitted and stock reserved at source",
            body = crate::models::Transfer),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock at source", body = crate::errors::ErrorResponse)
    )
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<CreateTransfer>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(transfer))))
}

/// Transfer history, newest first, filterable by status/variant/warehouse
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    params(TransferFilter),
    responses((status = 200, description = "Transfer page",
        body = crate::services::transfers::TransferPage))
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(filter): Query<TransferFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.transfers.list(filter).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// Fetch one transfer with its audit trail
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer", body = crate::models::Transfer),
        (status = 404, description = "Unknown transfer", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.get(id).await?;
    Ok(Json(ApiResponse::ok(transfer)))
}

/// Approve: pending -> in_transit (picked and dispatched)
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/approve",
    params(("id" = Uuid, Path, description = "Transfer id")),
    request_body = TransferActionRequest,
    responses(
        (status = 200, description = "Transfer in transit", body = crate::models::Transfer),
        (status = 409, description = "Not approvable from its current state",
            body = crate::errors::ErrorResponse)
    )
)]
pub async fn approve_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<TransferActionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.approve(id, &action.actor).await?;
    Ok(Json(ApiResponse::ok(transfer)))
}

/// Receive: in_transit -> completed (stock lands at destination)
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/receive",
    params(("id" = Uuid, Path, description = "Transfer id")),
    request_body = TransferActionRequest,
    responses(
        (status = 200, description = "Transfer completed", body = crate::models::Transfer),
        (status = 409, description = "Not receivable from its current state",
            body = crate::errors::ErrorResponse)
    )
)]
pub async fn receive_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<TransferActionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.services.transfers.receive(id, &action.actor).await?;
    Ok(Json(ApiResponse::ok(transfer)))
}

/// Cancel: pending|in_transit -> cancelled (reservation released)
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    params(("id" = Uuid, Path, description = "Transfer id")),
    request_body = TransferActionRequest,
    responses(
        (status = 200, description = "Transfer cancelled", body = crate::models::Transfer),
        (status = 409, description = "Completed transfers cannot be cancelled",
            body = crate::errors::ErrorResponse)
    )
)]
pub async fn cancel_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<TransferActionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state
        .services
        .transfers
        .cancel(id, &action.actor, action.reason)
        .await?;
    Ok(Json(ApiResponse::ok(transfer)))
}
