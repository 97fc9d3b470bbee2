//! Payment gateway adapter.
//!
//! Translates orders into gateway-specific payment initiation requests and
//! inbound gateway callbacks into settlement decisions. The two gateways are
//! structurally similar but diverge in wire detail, so both live behind one
//! [`PaymentGateway`] surface instead of duplicating the orchestration per
//! gateway.

use crate::{
    config::AppConfig,
    entities::order::{self, PaymentMethod},
    errors::ServiceError,
    services::payments::signature,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// The two supported online gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    /// Redirect-style gateway: the client posts an opaque signed payload to
    /// the gateway's hosted page. Amounts travel in major units.
    GatewayA,
    /// Hosted-checkout gateway: we call its API server-side and hand the
    /// returned checkout URL to the client. Amounts travel in minor units.
    GatewayB,
}

impl PaymentGateway {
    /// Maps a payment method to the gateway that serves it, if any.
    pub fn for_method(method: PaymentMethod) -> Option<Self> {
        match method {
            PaymentMethod::GatewayA => Some(PaymentGateway::GatewayA),
            PaymentMethod::GatewayB => Some(PaymentGateway::GatewayB),
            PaymentMethod::Card | PaymentMethod::Bank | PaymentMethod::Cash => None,
        }
    }
}

/// What checkout hands back to the client for an online payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum PaymentRequest {
    /// Gateway A: opaque base64 payload + signature for a client-side
    /// redirect form.
    Redirect { data: String, signature: String },
    /// Gateway B: hosted checkout URL returned by the gateway API.
    CheckoutUrl { checkout_url: String },
}

/// Settlement decision decoded from a verified callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The gateway reports the payment as settled.
    Confirmed,
    /// Any status other than the gateway's success token. Conservatively
    /// ignored: the order is left as-is rather than guessing at unknown
    /// gateway states.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct SettlementNotice {
    pub order_id: Uuid,
    pub settlement: Settlement,
}

/// Gateway credentials and endpoints, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub gateway_a_public_key: String,
    pub gateway_a_private_key: String,
    pub gateway_b_merchant_id: String,
    pub gateway_b_secret_key: String,
    pub gateway_b_endpoint: String,
    pub app_url: String,
    pub currency: String,
    pub http_timeout: Duration,
}

impl PaymentConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            gateway_a_public_key: config.gateway_a_public_key.clone(),
            gateway_a_private_key: config.gateway_a_private_key.clone(),
            gateway_b_merchant_id: config.gateway_b_merchant_id.clone(),
            gateway_b_secret_key: config.gateway_b_secret_key.clone(),
            gateway_b_endpoint: config.gateway_b_endpoint.clone(),
            app_url: config.app_url.clone(),
            currency: config.currency.clone(),
            http_timeout: Duration::from_secs(config.gateway_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnvelopedCallback {
    data: String,
    signature: String,
}

/// Converts a major-unit amount to the minor units gateway B expects.
fn minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::GatewayError(format!("amount {} out of range", amount)))
}

/// HTTP-capable adapter for both gateways.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl GatewayClient {
    pub fn new(config: PaymentConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Builds the payment initiation request for an order. Gateway A is pure
    /// payload construction; gateway B performs a signed outbound call whose
    /// failure (including timeout) surfaces as a gateway error.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create_payment_request(
        &self,
        gateway: PaymentGateway,
        order: &order::Model,
    ) -> Result<PaymentRequest, ServiceError> {
        match gateway {
            PaymentGateway::GatewayA => Ok(self.build_redirect_request(order)),
            PaymentGateway::GatewayB => {
                let checkout_url = self.request_checkout_url(order).await?;
                Ok(PaymentRequest::CheckoutUrl { checkout_url })
            }
        }
    }

    /// Decodes and authenticates a raw callback body. The signature is
    /// verified before any field is trusted; a bad signature yields
    /// `InvalidSignature` and the caller must not touch any order.
    pub fn parse_callback(
        &self,
        gateway: PaymentGateway,
        raw_body: &str,
    ) -> Result<SettlementNotice, ServiceError> {
        match gateway {
            PaymentGateway::GatewayA => self.parse_enveloped_callback(raw_body),
            PaymentGateway::GatewayB => self.parse_fields_callback(raw_body),
        }
    }

    fn build_redirect_request(&self, order: &order::Model) -> PaymentRequest {
        let payload = serde_json::json!({
            "public_key": self.config.gateway_a_public_key,
            "version": "3",
            "action": "pay",
            "amount": order.total_amount,
            "currency": self.config.currency,
            "description": format!("Payment for order {}", order.id),
            "order_id": order.id,
            "result_url": format!("{}/orders/{}/status", self.config.app_url, order.id),
            "server_url": format!(
                "{}/api/v1/payments/gateway-a/callback",
                self.config.app_url
            ),
        });

        let data = BASE64.encode(payload.to_string());
        let signature = signature::sign_enveloped(&self.config.gateway_a_private_key, &data);
        PaymentRequest::Redirect { data, signature }
    }

    async fn request_checkout_url(&self, order: &order::Model) -> Result<String, ServiceError> {
        let amount = minor_units(order.total_amount)?;
        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), amount.to_string());
        fields.insert("currency".to_string(), self.config.currency.clone());
        fields.insert(
            "merchant_id".to_string(),
            self.config.gateway_b_merchant_id.clone(),
        );
        fields.insert(
            "order_desc".to_string(),
            format!("Payment for order {}", order.id),
        );
        fields.insert("order_id".to_string(), order.id.to_string());
        fields.insert(
            "response_url".to_string(),
            format!("{}/orders/{}/status", self.config.app_url, order.id),
        );
        fields.insert(
            "server_callback_url".to_string(),
            format!(
                "{}/api/v1/payments/gateway-b/callback",
                self.config.app_url
            ),
        );

        let sig = signature::sign_fields(&self.config.gateway_b_secret_key, &fields);

        let mut request = serde_json::Map::new();
        for (key, value) in &fields {
            request.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        // The gateway expects the amount as a JSON number; canonicalization
        // for the signature uses its decimal string form either way.
        request.insert("amount".to_string(), serde_json::Value::from(amount));
        request.insert("signature".to_string(), serde_json::Value::String(sig));

        let response = self
            .http
            .post(&self.config.gateway_b_endpoint)
            .json(&serde_json::json!({ "request": request }))
            .send()
            .await
            .map_err(|e| {
                warn!("Gateway B checkout request failed: {}", e);
                ServiceError::GatewayError(format!("checkout request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::GatewayError(format!(
                "checkout endpoint returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::GatewayError(format!("unreadable response: {}", e)))?;

        body.get("response")
            .and_then(|r| r.get("checkout_url"))
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::GatewayError("malformed checkout response".to_string()))
    }

    fn parse_enveloped_callback(&self, raw_body: &str) -> Result<SettlementNotice, ServiceError> {
        let callback: EnvelopedCallback = serde_json::from_str(raw_body)
            .map_err(|e| ServiceError::BadRequest(format!("malformed callback: {}", e)))?;

        if !signature::verify_enveloped(
            &self.config.gateway_a_private_key,
            &callback.data,
            &callback.signature,
        ) {
            return Err(ServiceError::InvalidSignature);
        }

        let decoded = BASE64
            .decode(&callback.data)
            .map_err(|e| ServiceError::BadRequest(format!("malformed callback data: {}", e)))?;
        let payload: serde_json::Value = serde_json::from_slice(&decoded)
            .map_err(|e| ServiceError::BadRequest(format!("malformed callback data: {}", e)))?;

        let order_id = extract_order_id(&payload, "order_id")?;
        let settlement = match payload.get("status").and_then(|s| s.as_str()) {
            Some("success") => Settlement::Confirmed,
            other => {
                warn!(?other, %order_id, "Ignoring non-success gateway A status");
                Settlement::Ignored
            }
        };

        Ok(SettlementNotice {
            order_id,
            settlement,
        })
    }

    fn parse_fields_callback(&self, raw_body: &str) -> Result<SettlementNotice, ServiceError> {
        let body: serde_json::Value = serde_json::from_str(raw_body)
            .map_err(|e| ServiceError::BadRequest(format!("malformed callback: {}", e)))?;

        let response = body
            .get("response")
            .and_then(|r| r.as_object())
            .ok_or_else(|| ServiceError::BadRequest("missing response object".to_string()))?;

        let mut fields = BTreeMap::new();
        for (key, value) in response {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            fields.insert(key.clone(), rendered);
        }

        let provided = fields
            .get("signature")
            .cloned()
            .ok_or(ServiceError::InvalidSignature)?;
        if !signature::verify_fields(&self.config.gateway_b_secret_key, &fields, &provided) {
            return Err(ServiceError::InvalidSignature);
        }

        let payload = serde_json::Value::Object(response.clone());
        let order_id = extract_order_id(&payload, "order_id")?;
        let settlement = match fields.get("order_status").map(String::as_str) {
            Some("approved") => Settlement::Confirmed,
            other => {
                warn!(?other, %order_id, "Ignoring non-approved gateway B status");
                Settlement::Ignored
            }
        };

        Ok(SettlementNotice {
            order_id,
            settlement,
        })
    }
}

fn extract_order_id(payload: &serde_json::Value, key: &str) -> Result<Uuid, ServiceError> {
    payload
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ServiceError::BadRequest("missing or malformed order id".to_string()))
}
