use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    handlers::common::{created_response, success_response, PaginationParams},
    services::{checkout::CheckoutRequest, orders::UpdateStatusInput},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/payment", post(payment_request))
}

// POST /api/v1/orders
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created from the cart", body = crate::services::checkout::CheckoutOutcome),
        (status = 400, description = "Empty cart or invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 502, description = "Order committed but payment request failed; details carry the order id", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.checkout.checkout(user.id, request).await?;
    Ok(created_response(outcome))
}

// GET /api/v1/orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "The caller's orders, newest first", body = crate::services::orders::OrdersPage)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .orders
        .list_orders_for_user(user.id, pagination.page, pagination.per_page)
        .await?;
    Ok(success_response(page))
}

// GET /api/v1/orders/:id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its frozen lines", body = crate::services::orders::OrderDetail),
        (status = 404, description = "Not found or not the caller's order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state
        .services
        .orders
        .get_order(id, user.id, user.is_admin())
        .await?;
    Ok(success_response(detail))
}

// PUT /api/v1/orders/:id/status
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusInput,
    responses(
        (status = 200, description = "Order after the transition", body = crate::entities::order::Model),
        (status = 400, description = "Transition not allowed by the state machine", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_admin()?;
    let updated = state.services.orders.update_status(id, input).await?;
    Ok(success_response(updated))
}

// POST /api/v1/orders/:id/cancel
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Cancelled order; reserved stock was returned", body = crate::entities::order::Model),
        (status = 400, description = "Order already shipped or terminal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found or not the caller's order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let cancelled = state
        .services
        .orders
        .cancel_order(id, user.id, user.is_admin())
        .await?;
    Ok(success_response(cancelled))
}

// POST /api/v1/orders/:id/payment
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Fresh payment request for a pending order", body = crate::services::payments::PaymentRequest),
        (status = 400, description = "Order is not pending or settles out of band", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn payment_request(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = state
        .services
        .checkout
        .payment_request_for_order(user.id, id)
        .await?;
    Ok(success_response(request))
}
