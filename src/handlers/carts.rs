use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response},
    services::cart::AddToCartInput,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_item).delete(clear_cart))
        .route("/:product_id", delete(remove_item))
}

// GET /api/v1/cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Current cart priced at catalog prices", body = crate::services::cart::CartResponse),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(user.id).await?;
    Ok(success_response(cart))
}

// POST /api/v1/cart
#[utoipa::path(
    post,
    path = "/api/v1/cart",
    request_body = AddToCartInput,
    responses(
        (status = 201, description = "Cart line created or quantity bumped", body = crate::entities::cart_item::Model),
        (status = 400, description = "Invalid quantity or unavailable product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let line = state.services.cart.add_item(user.id, input).await?;
    Ok(created_response(line))
}

// DELETE /api/v1/cart/:product_id
#[utoipa::path(
    delete,
    path = "/api/v1/cart/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product whose cart line to remove")),
    responses(
        (status = 204, description = "Cart line removed"),
        (status = 404, description = "No such line in the cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.remove_item(user.id, product_id).await?;
    Ok(no_content_response())
}

// DELETE /api/v1/cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 204, description = "Cart emptied")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.clear(user.id).await?;
    Ok(no_content_response())
}
