use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Marketplace API",
        version = "0.1.0",
        description = r#"
# Marketplace API

Order checkout and payment reconciliation for a multi-seller marketplace.

## Checkout

`POST /api/v1/orders` converts the caller's cart into a pending order in a
single transaction: line prices are frozen, tracked stock is decremented and
the cart is cleared. Online payment methods additionally return a gateway
payment request.

## Settlement

Gateways confirm payments through signed server-to-server callbacks. Orders
move from `pending` to `paid` only through a verified callback; duplicate
callbacks are acknowledged without effect.

## Authentication

All endpoints except the gateway callbacks require a bearer token:

```
Authorization: Bearer <your-jwt-token>
```
"#
    ),
    paths(
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::payment_request,
        crate::handlers::payments::gateway_a_callback,
        crate::handlers::payments::gateway_b_callback,
    ),
    components(
        schemas(
            crate::entities::cart_item::Model,
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,
            crate::entities::order_item::Model,
            crate::services::cart::AddToCartInput,
            crate::services::cart::CartLineResponse,
            crate::services::cart::CartResponse,
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CheckoutOutcome,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrdersPage,
            crate::services::orders::UpdateStatusInput,
            crate::services::payments::PaymentRequest,
            crate::errors::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Cart", description = "Cart contents"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Payments", description = "Gateway settlement callbacks")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
