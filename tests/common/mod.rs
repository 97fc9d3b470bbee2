//! Shared integration test harness.
//!
//! Boots the full router against an in-memory SQLite database. The pool is
//! capped at one connection so every test sees a single coherent database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use marketplace_api as api;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const GATEWAY_A_SECRET: &str = "test_gateway_a_private_key";
pub const GATEWAY_B_SECRET: &str = "test_gateway_b_secret_key";

pub struct TestApp {
    pub router: Router,
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub config: api::config::AppConfig,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Boots the app, letting the caller adjust configuration first (for
    /// example pointing the gateway B endpoint at a mock server).
    pub async fn spawn_with(adjust: impl FnOnce(&mut api::config::AppConfig)) -> Self {
        let mut config =
            api::config::AppConfig::new("sqlite::memory:", TEST_JWT_SECRET, "127.0.0.1", 0, "test");
        config.gateway_a_public_key = "test_gateway_a_public_key".to_string();
        config.gateway_a_private_key = GATEWAY_A_SECRET.to_string();
        config.gateway_b_merchant_id = "1400001".to_string();
        config.gateway_b_secret_key = GATEWAY_B_SECRET.to_string();
        adjust(&mut config);

        let mut options = ConnectOptions::new(config.database_url.clone());
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.expect("connect db");
        api::migrator::Migrator::up(&db, None)
            .await
            .expect("migrations");
        let db = Arc::new(db);

        let (event_tx, mut event_rx) = mpsc::channel(1024);
        tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
        let event_sender = api::events::EventSender::new(event_tx);

        let services = api::handlers::AppServices::new(db.clone(), &config, event_sender.clone())
            .expect("services");
        let registry = Arc::new(api::notifications::ConnectionRegistry::new());

        let state = api::AppState {
            db: db.clone(),
            config: config.clone(),
            event_sender,
            services,
            registry,
        };

        let router = Router::new()
            .nest("/api/v1", api::api_v1_routes())
            .with_state(state);

        Self { router, db, config }
    }

    pub fn token_for(&self, user_id: Uuid, role: api::auth::Role) -> String {
        api::auth::issue_token(TEST_JWT_SECRET, user_id, role, Duration::hours(1)).expect("token")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        quantity: Option<i32>,
        status: api::entities::product::ProductStatus,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        api::entities::product::ActiveModel {
            id: Set(id),
            seller_id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} description", name)),
            price: Set(price),
            quantity: Set(quantity),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed product");
        id
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, json)
    }

    /// Posts a raw (non-JSON-helper) body, used by the callback tests.
    pub async fn post_raw(&self, path: &str, body: String) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, json)
    }

    /// Puts a product in the user's cart and returns their bearer token.
    pub async fn fill_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> String {
        let token = self.token_for(user_id, api::auth::Role::User);
        let (status, _) = self
            .request(
                "POST",
                "/api/v1/cart",
                Some(&token),
                Some(serde_json::json!({ "product_id": product_id, "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seeding cart failed");
        token
    }

    pub async fn order_status(&self, order_id: Uuid) -> api::entities::order::OrderStatus {
        use sea_orm::EntityTrait;
        api::entities::Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await
            .expect("query order")
            .expect("order exists")
            .status
    }

    pub async fn product_quantity(&self, product_id: Uuid) -> Option<i32> {
        use sea_orm::EntityTrait;
        api::entities::Product::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .expect("query product")
            .expect("product exists")
            .quantity
    }
}
