mod common;

use axum::http::StatusCode;
use common::TestApp;
use marketplace_api::entities::product::ProductStatus;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

/// With three units in stock and five buyers racing for one unit each,
/// exactly three checkouts may succeed. The guard is the conditional
/// decrement in the database, not any application-side lock.
#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let app = Arc::new(TestApp::spawn().await);
    let product_id = app
        .seed_product("Limited print", dec!(150), Some(3), ProductStatus::Approved)
        .await;

    let mut tokens = Vec::new();
    for _ in 0..5 {
        tokens.push(app.fill_cart(Uuid::new_v4(), product_id, 1).await);
    }

    let mut tasks = JoinSet::new();
    for token in tokens {
        let app = app.clone();
        tasks.spawn(async move {
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
            status
        });
    }

    let mut created = 0;
    let mut conflicts = 0;
    while let Some(result) = tasks.join_next().await {
        match result.expect("task panicked") {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected checkout status: {}", other),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(conflicts, 2);
    assert_eq!(app.product_quantity(product_id).await, Some(0));
}
