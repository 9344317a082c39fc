#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use checkout_api::{
    app_router,
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{order, product},
    handlers::AppServices,
    services::{
        commerce::{DbProductCatalog, ProductCatalog},
        payment_gateway::{GatewayError, PaymentGateway, PaymentSession, SessionRequest},
    },
    webhooks::{SignatureGenerator, SIGNATURE_HEADER},
    AppState,
};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test_secret_key_for_checkout_integration_tests_only";
pub const WEBHOOK_SECRET: &str = "whsec_test_checkout_secret";
pub const STOREFRONT_URL: &str = "https://storefront.test";

/// Gateway double that records every session request it receives.
#[derive(Default)]
pub struct RecordingGateway {
    requests: Mutex<Vec<SessionRequest>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingGateway {
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
            delay: None,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: false,
            delay: Some(delay),
        }
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<PaymentSession, GatewayError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GatewayError::Rejected {
                status: 500,
                body: "gateway down".to_string(),
            });
        }
        let order_id = request.correlation.order_id;
        Ok(PaymentSession {
            id: format!("cs_test_{}", order_id.simple()),
            url: format!("https://pay.test/session/{order_id}"),
        })
    }
}

/// Knobs for building a [`TestApp`]
pub struct TestOptions {
    pub failing_gateway: bool,
    /// Gateway answers only after this long; the session timeout drops to one second
    pub slow_gateway: Option<Duration>,
    pub webhook_secret: Option<String>,
    pub catalog: Option<Arc<dyn ProductCatalog>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            failing_gateway: false,
            slow_gateway: None,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            catalog: None,
        }
    }
}

/// Application wired over an in-memory SQLite database and a recording gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<RecordingGateway>,
    auth_service: Arc<AuthService>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            JWT_SECRET.to_string(),
            "test".to_string(),
        );
        cfg.storefront_url = STOREFRONT_URL.to_string();
        cfg.payment_webhook_secret = options.webhook_secret;
        if options.slow_gateway.is_some() {
            cfg.gateway_timeout_secs = 1;
        }

        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("connect in-memory sqlite");
        db::run_migrations(&pool).await.expect("run migrations");
        let db_arc = Arc::new(pool);

        seed_catalog(&db_arc).await;

        let catalog: Arc<dyn ProductCatalog> = options
            .catalog
            .unwrap_or_else(|| Arc::new(DbProductCatalog::new(db_arc.clone())));
        let gateway = Arc::new(if options.failing_gateway {
            RecordingGateway::failing()
        } else if let Some(delay) = options.slow_gateway {
            RecordingGateway::slow(delay)
        } else {
            RecordingGateway::default()
        });

        let auth_cfg = AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
        )
        .expect("auth config");
        let auth_service = Arc::new(AuthService::new(auth_cfg));

        let services = AppServices::new(db_arc.clone(), &cfg, catalog, gateway.clone());
        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            services,
            auth: auth_service.clone(),
        };

        Self {
            router: app_router(state.clone()),
            state,
            gateway,
            auth_service,
        }
    }

    pub fn token_for(&self, user_id: &str) -> String {
        self.auth_service
            .issue_token(user_id, Duration::from_secs(3600))
            .expect("issue token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        self.request_with_headers(method, uri, body, token, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let raw = body.map(|b| b.to_string());
        self.raw_request(method, uri, raw, token, headers).await
    }

    pub async fn raw_request(
        &self,
        method: Method,
        uri: &str,
        body: Option<String>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .expect("build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Deliver a webhook body signed with the configured secret
    pub async fn deliver_webhook(&self, payload: &Value) -> Response {
        let body = payload.to_string();
        let signature = SignatureGenerator::new(WEBHOOK_SECRET)
            .header_value(Utc::now().timestamp(), body.as_bytes());
        self.raw_request(
            Method::POST,
            "/api/v1/payments/webhook",
            Some(body),
            None,
            &[(SIGNATURE_HEADER, signature.as_str())],
        )
        .await
    }

    /// Make every order insert fail while catalog reads keep working
    pub async fn break_order_store(&self) {
        self.state
            .db
            .execute_unprepared("DROP TABLE orders")
            .await
            .expect("drop orders table");
    }

    pub async fn orders_in_db(&self) -> Vec<order::Model> {
        order::Entity::find()
            .all(&*self.state.db)
            .await
            .expect("load orders")
    }
}

/// Products "A" (Alpha, 500) and "B" (Beta, 250) plus an inactive "retired".
async fn seed_catalog(db: &sea_orm::DatabaseConnection) {
    for (id, name, price, active) in [
        ("A", "Alpha", 500_i64, true),
        ("B", "Beta", 250, true),
        ("retired", "Retired", 100, false),
    ] {
        product::ActiveModel {
            id: Set(id.to_string()),
            name: Set(name.to_string()),
            unit_price: Set(price),
            is_active: Set(active),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("seed product");
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Gateway event carrying the correlation metadata checkout attaches
pub fn gateway_event(event_type: &str, order_id: &str, user_id: &str) -> Value {
    let payment_status = match event_type {
        "checkout.session.expired" | "checkout.session.async_payment_failed" => "unpaid",
        _ => "paid",
    };
    gateway_event_with_payment(event_type, order_id, user_id, payment_status)
}

pub fn gateway_event_with_payment(
    event_type: &str,
    order_id: &str,
    user_id: &str,
    payment_status: &str,
) -> Value {
    serde_json::json!({
        "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
        "type": event_type,
        "data": {
            "object": {
                "id": "cs_test_1",
                "payment_status": payment_status,
                "metadata": { "order_id": order_id, "user_id": user_id }
            }
        }
    })
}
