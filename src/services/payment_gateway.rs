//! Payment gateway session API.
//!
//! [`PaymentGateway`] is the seam the checkout flow talks to; [`HttpPaymentGateway`]
//! is the default implementation against a Stripe-compatible
//! `POST /v1/checkout/sessions` endpoint.

use crate::services::commerce::pricing_service::PricedLineItem;
use async_trait::async_trait;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const METADATA_ORDER_ID: &str = "order_id";
const METADATA_USER_ID: &str = "user_id";

/// A line item in the gateway's own unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayLineItem {
    pub name: String,
    pub unit_amount: u64,
    pub quantity: u64,
}

impl GatewayLineItem {
    /// Scale a priced line into gateway units. `None` on overflow.
    pub fn from_priced(item: &PricedLineItem, unit_multiplier: u64) -> Option<Self> {
        Some(Self {
            name: item.name.clone(),
            unit_amount: item.unit_price.checked_mul(unit_multiplier)?,
            quantity: item.quantity,
        })
    }
}

/// Ties a gateway session back to the order that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationPayload {
    pub order_id: Uuid,
    pub user_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("metadata is missing {0}")]
    Missing(&'static str),
    #[error("metadata order_id is not a UUID: {0}")]
    InvalidOrderId(String),
}

impl CorrelationPayload {
    pub fn new(order_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            order_id,
            user_id: user_id.into(),
        }
    }

    pub fn to_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (METADATA_ORDER_ID.to_string(), self.order_id.to_string()),
            (METADATA_USER_ID.to_string(), self.user_id.clone()),
        ])
    }

    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Result<Self, CorrelationError> {
        let raw_order_id = metadata
            .get(METADATA_ORDER_ID)
            .ok_or(CorrelationError::Missing(METADATA_ORDER_ID))?;
        let order_id = Uuid::parse_str(raw_order_id)
            .map_err(|_| CorrelationError::InvalidOrderId(raw_order_id.clone()))?;
        let user_id = metadata
            .get(METADATA_USER_ID)
            .filter(|v| !v.is_empty())
            .ok_or(CorrelationError::Missing(METADATA_USER_ID))?;

        Ok(Self {
            order_id,
            user_id: user_id.clone(),
        })
    }
}

/// Everything needed to open one payment session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub line_items: Vec<GatewayLineItem>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub correlation: CorrelationPayload,
    /// Stable per order, so a repeated call cannot open a second session
    pub idempotency_key: String,
}

impl SessionRequest {
    pub fn idempotency_key_for(order_id: Uuid) -> String {
        format!("checkout-session-{order_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway is not configured: {0}")]
    NotConfigured(String),

    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway rejected session request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway returned an unusable response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<PaymentSession, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

/// Stripe-compatible HTTP client
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::NotConfigured(e.to_string()))?;
        Ok(Self::with_client(client, base_url, secret_key))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        secret_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn from_config(cfg: &crate::config::AppConfig) -> Result<Self, GatewayError> {
        Self::new(
            cfg.gateway_base_url.clone(),
            cfg.gateway_secret_key.clone(),
            cfg.gateway_timeout(),
        )
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.base_url)
    }

    /// Form fields in the gateway's bracketed encoding.
    pub fn form_params(request: &SessionRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];

        for (i, item) in request.line_items.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            params.push((
                format!("{prefix}[price_data][currency]"),
                request.currency.clone(),
            ));
            params.push((
                format!("{prefix}[price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            params.push((
                format!("{prefix}[price_data][product_data][name]"),
                item.name.clone(),
            ));
            params.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        }

        for (key, value) in request.correlation.to_metadata() {
            params.push((format!("metadata[{key}]"), value));
        }

        params
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(order_id = %request.correlation.order_id))]
    async fn create_session(&self, request: &SessionRequest) -> Result<PaymentSession, GatewayError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured("missing gateway secret key".into()))?;

        let start = Instant::now();
        let result = self
            .client
            .post(self.sessions_url())
            .bearer_auth(secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&Self::form_params(request))
            .send()
            .await;
        histogram!("checkout_gateway_latency_seconds", start.elapsed());

        let response = result.map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "gateway rejected session request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let url = session
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("session has no url".into()))?;

        debug!(session_id = %session.id, "payment session created");
        Ok(PaymentSession {
            id: session.id,
            url,
        })
    }
}
