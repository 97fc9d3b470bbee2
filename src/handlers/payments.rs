//! Gateway settlement callbacks.
//!
//! Both endpoints are unauthenticated by design; the signature inside the
//! body is the authentication. Bodies are taken raw so the exact bytes the
//! gateway signed are what gets verified.

use crate::{
    errors::ServiceError,
    services::payments::{PaymentGateway, Settlement},
    AppState,
};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use tracing::info;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/gateway-a/callback", post(gateway_a_callback))
        .route("/gateway-b/callback", post(gateway_b_callback))
}

// POST /api/v1/payments/gateway-a/callback
#[utoipa::path(
    post,
    path = "/api/v1/payments/gateway-a/callback",
    request_body = String,
    responses(
        (status = 200, description = "Callback processed (including duplicates and ignored statuses)"),
        (status = 400, description = "Malformed body or invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn gateway_a_callback(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ServiceError> {
    handle_callback(&state, PaymentGateway::GatewayA, &body).await
}

// POST /api/v1/payments/gateway-b/callback
#[utoipa::path(
    post,
    path = "/api/v1/payments/gateway-b/callback",
    request_body = String,
    responses(
        (status = 200, description = "Callback processed (including duplicates and ignored statuses)"),
        (status = 400, description = "Malformed body or invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn gateway_b_callback(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, ServiceError> {
    handle_callback(&state, PaymentGateway::GatewayB, &body).await
}

async fn handle_callback(
    state: &AppState,
    gateway: PaymentGateway,
    body: &str,
) -> Result<impl IntoResponse, ServiceError> {
    let notice = state.services.gateway.parse_callback(gateway, body)?;

    match notice.settlement {
        Settlement::Confirmed => {
            let outcome = state
                .services
                .orders
                .settle_from_callback(notice.order_id)
                .await?;
            info!(order_id = %notice.order_id, ?gateway, ?outcome, "Settlement callback applied");
        }
        Settlement::Ignored => {
            // Unknown orders are rejected even when the status warrants no
            // transition.
            state.services.orders.require_order(notice.order_id).await?;
            info!(order_id = %notice.order_id, ?gateway, "Settlement callback ignored");
        }
    }

    Ok(Json(json!({ "status": "ok" })))
}
