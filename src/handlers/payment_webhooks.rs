use crate::{
    errors::ServiceError,
    services::payment_confirmation::GatewayEvent,
    webhooks::{SignatureGenerator, SIGNATURE_HEADER},
    AppState,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

pub fn payment_webhook_routes() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(payment_webhook))
}

/// Acknowledgement returned for every accepted event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// What the event did: applied, already_processed, unknown_order, owner_mismatch,
    /// awaiting_payment, uncorrelated or ignored
    pub outcome: String,
}

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookAck),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 503, description = "Webhook secret not configured", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let secret = state
        .config
        .payment_webhook_secret
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            warn!("Payment webhook received but no webhook secret is configured");
            ServiceError::ServiceUnavailable("payment webhooks are not configured".to_string())
        })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());
    SignatureGenerator::new(secret)
        .verify(
            signature,
            &body,
            state.config.payment_webhook_tolerance_secs,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|e| {
            warn!(error = %e, "Payment webhook signature verification failed");
            ServiceError::Unauthorized("invalid webhook signature".to_string())
        })?;

    let event: GatewayEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid event payload: {}", e)))?;

    let outcome = state
        .services
        .payment_confirmation
        .apply_event(&event)
        .await?;
    info!(event_id = %event.id, outcome = outcome.label(), "Payment webhook processed");

    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome.label().to_string(),
    }))
}
