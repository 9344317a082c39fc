use super::pricing_service::{PricedCart, PricingError, PricingService};
use crate::{
    entities::order::{self, PaymentStatus},
    errors::CheckoutError,
    services::payment_gateway::{
        CorrelationPayload, GatewayError, GatewayLineItem, PaymentGateway, SessionRequest,
    },
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One untrusted cart line as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    /// Catalog product reference
    #[validate(length(min = 1, message = "product reference must not be empty"))]
    pub product: String,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
}

/// Checkout input after identity has been established
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Shipping address; stored as submitted
    #[serde(default)]
    #[schema(value_type = Object)]
    pub address: Option<Value>,
    #[serde(default)]
    pub items: Vec<CartLine>,
}

/// Where the gateway sends the shopper afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTargets {
    pub success_url: String,
    pub cancel_url: String,
}

impl RedirectTargets {
    pub fn from_origin(origin: &str) -> Self {
        let origin = origin.trim().trim_end_matches('/');
        Self {
            success_url: format!("{origin}/order-placed"),
            cancel_url: format!("{origin}/cart"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub payment_type: String,
    pub currency: String,
    pub gateway_unit_multiplier: u64,
    /// Upper bound on one session request, independent of the gateway client
    pub gateway_timeout: Duration,
}

impl From<&crate::config::AppConfig> for CheckoutSettings {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self {
            payment_type: cfg.payment_type.clone(),
            currency: cfg.payment_currency.to_lowercase(),
            gateway_unit_multiplier: cfg.gateway_unit_multiplier,
            gateway_timeout: cfg.gateway_timeout(),
        }
    }
}

/// Result of a successful checkout
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub total: u64,
    pub session_id: String,
    pub redirect_url: String,
}

/// Null, blank strings, empty containers and other falsy values count as no address.
pub fn is_address_present(address: Option<&Value>) -> bool {
    match address {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        Some(Value::Bool(true)) => true,
    }
}

impl From<PricingError> for CheckoutError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::UnknownProduct { product_ref, position } => {
                CheckoutError::InvalidProduct(format!("line {position}: {product_ref}"))
            }
            PricingError::InvalidQuantity { .. } | PricingError::Overflow => {
                CheckoutError::InvalidRequest(err.to_string())
            }
            PricingError::Catalog(inner) => CheckoutError::CatalogUnavailable(inner.to_string()),
        }
    }
}

/// Turns a cart into a pending order and a payment session
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    pricing: PricingService,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        pricing: PricingService,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            db,
            pricing,
            gateway,
            settings,
        }
    }

    /// Validate, price, persist a pending order, then open a payment session.
    ///
    /// Nothing is written unless validation and pricing succeed. If the gateway
    /// fails afterwards the order is left `pending`.
    #[instrument(skip(self, request, redirects), fields(owner_id = %owner_id, lines = request.items.len()))]
    pub async fn checkout(
        &self,
        owner_id: &str,
        request: CheckoutRequest,
        redirects: &RedirectTargets,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let result = self.run(owner_id, request, redirects).await;

        match &result {
            Ok(outcome) => {
                counter!("checkout_sessions_started_total", 1);
                info!(order_id = %outcome.order_id, total = outcome.total, "checkout completed");
            }
            Err(err) => {
                counter!("checkout_failures_total", 1, "kind" => err.kind());
                match err {
                    CheckoutError::InvalidRequest(_) | CheckoutError::InvalidProduct(_) => {
                        warn!(kind = err.kind(), error = %err, "checkout rejected")
                    }
                    _ => error!(kind = err.kind(), error = %err, "checkout failed"),
                }
            }
        }

        result
    }

    async fn run(
        &self,
        owner_id: &str,
        request: CheckoutRequest,
        redirects: &RedirectTargets,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        Self::validate_request(owner_id, &request)?;

        let priced = self.pricing.price_cart(&request.items).await?;
        let line_items = self.gateway_line_items(&priced)?;

        let order_id = self.persist_pending_order(owner_id, request, &priced).await?;

        let session_request = SessionRequest {
            line_items,
            currency: self.settings.currency.clone(),
            success_url: redirects.success_url.clone(),
            cancel_url: redirects.cancel_url.clone(),
            correlation: CorrelationPayload::new(order_id, owner_id),
            idempotency_key: SessionRequest::idempotency_key_for(order_id),
        };

        let session = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.create_session(&session_request),
        )
        .await
        .unwrap_or_else(|_| {
            Err(GatewayError::Transport(format!(
                "no session after {:?}",
                self.settings.gateway_timeout
            )))
        })
        .map_err(|e| {
            warn!(%order_id, error = %e, "order left pending after gateway failure");
            CheckoutError::PaymentGatewayFailure(e.to_string())
        })?;

        Ok(CheckoutOutcome {
            order_id,
            total: priced.total,
            session_id: session.id,
            redirect_url: session.url,
        })
    }

    fn validate_request(owner_id: &str, request: &CheckoutRequest) -> Result<(), CheckoutError> {
        if owner_id.trim().is_empty() {
            return Err(CheckoutError::InvalidRequest("missing owner identity".into()));
        }
        if !is_address_present(request.address.as_ref()) {
            return Err(CheckoutError::InvalidRequest("address is required".into()));
        }
        if request.items.is_empty() {
            return Err(CheckoutError::InvalidRequest("cart is empty".into()));
        }
        for (position, line) in request.items.iter().enumerate() {
            line.validate().map_err(|e| {
                CheckoutError::InvalidRequest(format!("line {position}: {e}"))
            })?;
        }
        Ok(())
    }

    fn gateway_line_items(&self, priced: &PricedCart) -> Result<Vec<GatewayLineItem>, CheckoutError> {
        priced
            .items
            .iter()
            .map(|item| {
                GatewayLineItem::from_priced(item, self.settings.gateway_unit_multiplier).ok_or_else(
                    || CheckoutError::InvalidRequest("order total exceeds supported range".into()),
                )
            })
            .collect()
    }

    async fn persist_pending_order(
        &self,
        owner_id: &str,
        request: CheckoutRequest,
        priced: &PricedCart,
    ) -> Result<Uuid, CheckoutError> {
        let amount = i64::try_from(priced.total).map_err(|_| {
            CheckoutError::InvalidRequest("order total exceeds supported range".into())
        })?;
        let items = serde_json::to_value(&request.items)
            .map_err(|e| CheckoutError::PersistenceFailure(e.to_string()))?;
        let address = request.address.unwrap_or(Value::Null);

        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(owner_id.to_string()),
            address: Set(address),
            items: Set(items),
            amount: Set(amount),
            payment_type: Set(self.settings.payment_type.clone()),
            payment_status: Set(PaymentStatus::Pending),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        order
            .insert(&*self.db)
            .await
            .map_err(|e| CheckoutError::PersistenceFailure(e.to_string()))?;

        counter!("checkout_orders_created_total", 1);
        info!(%order_id, amount, "pending order persisted");
        Ok(order_id)
    }
}
