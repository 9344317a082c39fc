use crate::handlers::common::request_origin;
use crate::{
    auth::AuthUser,
    errors::{CheckoutError, ServiceError},
    services::commerce::{CheckoutRequest, RedirectTargets},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(create_checkout))
}

/// Uniform checkout result. Failures carry a fixed caller-safe message.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"success": true, "url": "https://checkout.stripe.com/c/pay/cs_test_a1"}))]
pub struct CheckoutResponse {
    pub success: bool,
    /// Gateway page to redirect the shopper to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckoutResponse {
    pub fn redirect(url: String) -> Self {
        Self {
            success: true,
            url: Some(url),
            message: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            url: None,
            message: Some(message.to_string()),
        }
    }
}

fn failure_response(err: CheckoutError) -> Response {
    if err.is_enveloped() {
        (err.status_code(), Json(CheckoutResponse::failure(err.caller_message()))).into_response()
    } else {
        ServiceError::from(err).into_response()
    }
}

/// Price a cart, record a pending order and open a payment session
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    summary = "Start checkout",
    description = "Prices the cart from catalog data, persists a pending order and returns the payment gateway redirect URL",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Payment session created", body = CheckoutResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid data or unknown product", body = CheckoutResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order could not be saved", body = CheckoutResponse),
        (status = 502, description = "Payment session could not be started", body = CheckoutResponse),
        (status = 503, description = "Product catalog unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Checkout"
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(owner_id = %user.user_id, error = %rejection.body_text(), "unreadable checkout body");
            return failure_response(CheckoutError::InvalidRequest(rejection.body_text()));
        }
    };

    let origin = request_origin(&headers, &state.config.storefront_url);
    let redirects = RedirectTargets::from_origin(&origin);

    match state
        .services
        .checkout
        .checkout(&user.user_id, request, &redirects)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(CheckoutResponse::redirect(outcome.redirect_url)),
        )
            .into_response(),
        Err(err) => failure_response(err),
    }
}
