use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::errors::ServiceError;
use crate::services::stock::{AdjustStock, ReceiveStock};
use crate::{ApiResponse, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/receive", post(receive_stock))
        .route("/adjust", post(adjust_stock))
}

/// Stock-in: register quantity arriving at a warehouse
#[utoipa::path(
    post,
    path = "/api/v1/stock/receive",
    request_body = ReceiveStock,
    responses(
        (status = 201, description = "Stock received", body = crate::models::StockRecord),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown variant or warehouse", body = crate::errors::ErrorResponse)
    )
)]
pub async fn receive_stock(
    State(state): State<AppState>,
    Json(payload): Json<ReceiveStock>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.services.stock.receive_stock(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(record))))
}

/// Audited manual correction of the available pool
#[utoipa::path(
    post,
    path = "/api/v1/stock/adjust",
    request_body = AdjustStock,
    responses(
        (status = 200, description = "Stock adjusted", body = crate::models::StockRecord),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    )
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(payload): Json<AdjustStock>,
) -> Result<impl IntoResponse, ServiceError> {
    let record = state.services.stock.adjust_stock(payload).await?;
    Ok(Json(ApiResponse::ok(record)))
}
