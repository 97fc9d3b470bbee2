mod common;

use axum::http::StatusCode;
use common::TestApp;
use marketplace_api::{auth::Role, entities::product::ProductStatus};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn cash_checkout_creates_pending_order_with_frozen_total() {
    let app = TestApp::spawn().await;
    let tracked = app
        .seed_product("Walnut desk", dec!(100), Some(10), ProductStatus::Approved)
        .await;
    let untracked = app
        .seed_product("Gift wrap", dec!(50), None, ProductStatus::Approved)
        .await;

    let user_id = Uuid::new_v4();
    let token = app.fill_cart(user_id, tracked, 2).await;
    let (status, _) = app
        .request(
            "POST",
            "/api/v1/cart",
            Some(&token),
            Some(json!({ "product_id": untracked, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St, Springfield",
                "contact_phone": "+15550001111"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["order"]["status"], "pending");
    assert_eq!(body["order"]["total_amount"], "250");
    assert!(body.get("payment_request").is_none());

    // Tracked stock decremented, untracked left alone.
    assert_eq!(app.product_quantity(tracked).await, Some(8));
    assert_eq!(app.product_quantity(untracked).await, None);

    // Checkout cleared the cart.
    let (status, cart) = app.request("GET", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn empty_cart_checkout_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.token_for(Uuid::new_v4(), Role::User);

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unapproved_product_cannot_be_carted() {
    let app = TestApp::spawn().await;
    let pending = app
        .seed_product("Unreviewed lamp", dec!(30), Some(5), ProductStatus::Pending)
        .await;
    let token = app.token_for(Uuid::new_v4(), Role::User);

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/cart",
            Some(&token),
            Some(json!({ "product_id": pending, "quantity": 1 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_lines_keep_prices_from_checkout_time() {
    use marketplace_api::entities::product;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    let app = TestApp::spawn().await;
    let product_id = app
        .seed_product("Oak shelf", dec!(80), Some(5), ProductStatus::Approved)
        .await;

    let user_id = Uuid::new_v4();
    let token = app.fill_cart(user_id, product_id, 1).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    // Catalog price changes after the order was placed.
    let listing = product::Entity::find_by_id(product_id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: product::ActiveModel = listing.into();
    active.price = Set(dec!(999));
    active.update(app.db.as_ref()).await.unwrap();

    let (status, detail) = app
        .request(
            "GET",
            &format!("/api/v1/orders/{}", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["total_amount"], "80");
    assert_eq!(detail["items"][0]["price"], "80");
}

#[tokio::test]
async fn oversell_is_rejected_with_conflict() {
    let app = TestApp::spawn().await;
    let product_id = app
        .seed_product("Last unit", dec!(40), Some(1), ProductStatus::Approved)
        .await;

    let first = app.fill_cart(Uuid::new_v4(), product_id, 1).await;
    let second = app.fill_cart(Uuid::new_v4(), product_id, 1).await;

    let checkout_body = json!({
        "payment_method": "cash",
        "shipping_address": "1 Main St",
        "contact_phone": "+15550001111"
    });

    let (status, _) = app
        .request("POST", "/api/v1/orders", Some(&first), Some(checkout_body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .request("POST", "/api/v1/orders", Some(&second), Some(checkout_body))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(app.product_quantity(product_id).await, Some(0));
}

#[tokio::test]
async fn hosted_checkout_sends_minor_units_and_returns_url() {
    let mock = MockServer::start().await;
    // The mock only matches when the signed request carries the amount in
    // minor units; a wrong amount would 404 and surface as a 502.
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({
            "request": { "amount": 25000, "currency": "USD" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "checkout_url": "https://pay.example.com/checkout/abc123" }
        })))
        .mount(&mock)
        .await;

    let endpoint = format!("{}/", mock.uri());
    let app = TestApp::spawn_with(|cfg| cfg.gateway_b_endpoint = endpoint).await;
    let product_id = app
        .seed_product("Velvet chair", dec!(250), Some(3), ProductStatus::Approved)
        .await;

    let token = app.fill_cart(Uuid::new_v4(), product_id, 1).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "gateway_b",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(
        body["payment_request"]["checkout_url"],
        "https://pay.example.com/checkout/abc123"
    );
    assert_eq!(body["order"]["status"], "pending");
}

#[tokio::test]
async fn gateway_outage_after_commit_keeps_order_and_reports_id() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    let endpoint = format!("{}/", mock.uri());
    let app = TestApp::spawn_with(|cfg| cfg.gateway_b_endpoint = endpoint).await;
    let product_id = app
        .seed_product("Brass lamp", dec!(60), Some(2), ProductStatus::Approved)
        .await;

    let token = app.fill_cart(Uuid::new_v4(), product_id, 1).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "gateway_b",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let order_id: Uuid = body["details"]["order_id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("error details carry the committed order id");

    // The checkout itself committed: order pending, stock decremented.
    assert_eq!(
        app.order_status(order_id).await,
        marketplace_api::entities::order::OrderStatus::Pending
    );
    assert_eq!(app.product_quantity(product_id).await, Some(1));
}

#[tokio::test]
async fn payment_request_can_be_retried_for_pending_order() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "checkout_url": "https://pay.example.com/checkout/retry" }
        })))
        .mount(&mock)
        .await;

    let endpoint = format!("{}/", mock.uri());
    let app = TestApp::spawn_with(|cfg| cfg.gateway_b_endpoint = endpoint).await;
    let product_id = app
        .seed_product("Tea set", dec!(90), Some(4), ProductStatus::Approved)
        .await;

    let user_id = Uuid::new_v4();
    let token = app.fill_cart(user_id, product_id, 1).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "gateway_b",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let (status, retry) = app
        .request(
            "POST",
            &format!("/api/v1/orders/{}/payment", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        retry["checkout_url"],
        "https://pay.example.com/checkout/retry"
    );
}

#[tokio::test]
async fn users_only_see_their_own_orders() {
    let app = TestApp::spawn().await;
    let product_id = app
        .seed_product("Rug", dec!(120), Some(5), ProductStatus::Approved)
        .await;

    let owner = Uuid::new_v4();
    let token = app.fill_cart(owner, product_id, 1).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let stranger = app.token_for(Uuid::new_v4(), Role::User);
    let (status, _) = app
        .request(
            "GET",
            &format!("/api/v1/orders/{}", order_id),
            Some(&stranger),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = app
        .request("GET", "/api/v1/orders", Some(&stranger), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_items"], 0);
}

#[tokio::test]
async fn cancelling_a_pending_order_restores_stock() {
    let app = TestApp::spawn().await;
    let product_id = app
        .seed_product("Mirror", dec!(70), Some(2), ProductStatus::Approved)
        .await;

    let user_id = Uuid::new_v4();
    let token = app.fill_cart(user_id, product_id, 2).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.product_quantity(product_id).await, Some(0));
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let (status, cancelled) = app
        .request(
            "POST",
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(app.product_quantity(product_id).await, Some(2));
}

#[tokio::test]
async fn status_updates_are_admin_only_and_follow_the_state_machine() {
    let app = TestApp::spawn().await;
    let product_id = app
        .seed_product("Clock", dec!(55), Some(5), ProductStatus::Approved)
        .await;

    let user_id = Uuid::new_v4();
    let token = app.fill_cart(user_id, product_id, 1).await;
    let (status, body) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["order"]["id"].as_str().unwrap().to_string();
    let status_path = format!("/api/v1/orders/{}/status", order_id);

    // Non-admin rejected.
    let (status, _) = app
        .request("PUT", &status_path, Some(&token), Some(json!({ "status": "shipped" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.token_for(Uuid::new_v4(), Role::Admin);
    let (status, updated) = app
        .request(
            "PUT",
            &status_path,
            Some(&admin),
            Some(json!({
                "status": "shipped",
                "tracking_number": "TRK-42",
                "delivery_service": "Post"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "shipped");
    assert_eq!(updated["tracking_number"], "TRK-42");

    // Shipped orders cannot go back to pending.
    let (status, _) = app
        .request("PUT", &status_path, Some(&admin), Some(json!({ "status": "pending" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nor be cancelled.
    let (status, _) = app
        .request(
            "POST",
            &format!("/api/v1/orders/{}/cancel", order_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_line_rolls_back_the_entire_checkout() {
    use marketplace_api::entities::{Order, OrderItem};
    use sea_orm::EntityTrait;

    let app = TestApp::spawn().await;
    let plentiful = app
        .seed_product("Wool blanket", dec!(45), Some(5), ProductStatus::Approved)
        .await;
    let scarce = app
        .seed_product("Antique globe", dec!(200), Some(1), ProductStatus::Approved)
        .await;

    let user_id = Uuid::new_v4();
    let token = app.fill_cart(user_id, plentiful, 1).await;
    let (status, _) = app
        .request(
            "POST",
            "/api/v1/cart",
            Some(&token),
            Some(json!({ "product_id": scarce, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .request(
            "POST",
            "/api/v1/orders",
            Some(&token),
            Some(json!({
                "payment_method": "cash",
                "shipping_address": "1 Main St",
                "contact_phone": "+15550001111"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The whole transaction rolled back: no order, no lines, both stock
    // counts untouched, cart still holds both lines.
    assert!(Order::find().all(app.db.as_ref()).await.unwrap().is_empty());
    assert!(OrderItem::find().all(app.db.as_ref()).await.unwrap().is_empty());
    assert_eq!(app.product_quantity(plentiful).await, Some(5));
    assert_eq!(app.product_quantity(scarce).await, Some(1));

    let (status, cart) = app.request("GET", "/api/v1/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(2));
}
