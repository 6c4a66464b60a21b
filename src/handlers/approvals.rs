use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::approvals::SubmitApproval;
use crate::{ApiResponse, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pending).post(submit_approval))
        .route("/refresh", post(refresh_queue))
        .route("/:id/resolve", post(resolve_approval))
        .route("/:id/disconnected", post(mark_disconnected))
        .route("/:id/reconnect", post(reconnect))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResolveRequest {
    pub approved: bool,
    pub notes: Option<String>,
    pub resolved_by: String,
}

/// Pending approvals, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/approvals",
    responses((status = 200, description = "Pending approvals"))
)]
pub async fn list_pending(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.services.approvals.pending_list()))
}

/// Submit an operation for second-party sign-off
#[utoipa::path(
    post,
    path = "/api/v1/approvals",
    request_body = SubmitApproval,
    responses(
        (status = 201, description = "Approval enqueued", body = crate::models::PendingApproval),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    )
)]
pub async fn submit_approval(
    State(state): State<AppState>,
    Json(payload): Json<SubmitApproval>,
) -> Result<impl IntoResponse, ServiceError> {
    let approval = state.services.approvals.submit(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(approval))))
}

/// Approver-side refresh: drops disconnected entries, returns the live set
#[utoipa::path(
    post,
    path = "/api/v1/approvals/refresh",
    responses((status = 200, description = "Live pending approvals"))
)]
pub async fn refresh_queue(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.services.approvals.refresh()))
}

/// Approve or reject a pending operation
#[utoipa::path(
    post,
    path = "/api/v1/approvals/{id}/resolve",
    params(("id" = Uuid, Path, description = "Approval id")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Approval resolved", body = crate::models::ApprovalDecision),
        (status = 400, description = "Submitter disconnected; approval disabled",
            body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown approval", body = crate::errors::ErrorResponse)
    )
)]
pub async fn resolve_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResolveRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let decision = state
        .services
        .approvals
        .resolve(id, payload.approved, payload.notes, &payload.resolved_by)
        .await?;
    Ok(Json(ApiResponse::ok(decision)))
}

/// Flag the submitter as disconnected mid-flight
#[utoipa::path(
    post,
    path = "/api/v1/approvals/{id}/disconnected",
    params(("id" = Uuid, Path, description = "Approval id")),
    responses((status = 200, description = "Entry flagged", body = crate::models::PendingApproval))
)]
pub async fn mark_disconnected(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let approval = state.services.approvals.mark_disconnected(id)?;
    Ok(Json(ApiResponse::ok(approval)))
}

/// Clear the disconnect flag after the submitter re-establishes state
#[utoipa::path(
    post,
    path = "/api/v1/approvals/{id}/reconnect",
    params(("id" = Uuid, Path, description = "Approval id")),
    responses((status = 200, description = "Entry re-enabled", body = crate::models::PendingApproval))
)]
pub async fn reconnect(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let approval = state.services.approvals.reconnect(id)?;
    Ok(Json(ApiResponse::ok(approval)))
}
