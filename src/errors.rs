use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard error body for everything outside the checkout envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Not Found",
    "message": "Not found: order 550e8400-e29b-41d4-a716-446655440000",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::ExternalServiceError(_) => "Upstream service error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// Failure taxonomy of the checkout orchestration.
///
/// The first four kinds are rendered as the uniform `{success: false, message}`
/// envelope. `CatalogUnavailable` is a transport outage of the catalog and is
/// rendered as a plain service error instead.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("payment gateway failure: {0}")]
    PaymentGatewayFailure(String),

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl CheckoutError {
    /// Stable label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidProduct(_) => "invalid_product",
            Self::PersistenceFailure(_) => "persistence_failure",
            Self::PaymentGatewayFailure(_) => "payment_gateway_failure",
            Self::CatalogUnavailable(_) => "catalog_unavailable",
        }
    }

    /// Caller-safe message. The detail carried by the variant is only logged.
    pub fn caller_message(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "Invalid data",
            Self::InvalidProduct(_) => "Invalid product",
            Self::PersistenceFailure(_) => "Unable to save order",
            Self::PaymentGatewayFailure(_) => "Unable to start payment session",
            Self::CatalogUnavailable(_) => "Product catalog unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidProduct(_) => StatusCode::BAD_REQUEST,
            Self::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentGatewayFailure(_) => StatusCode::BAD_GATEWAY,
            Self::CatalogUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether this failure is reported through the checkout envelope.
    pub fn is_enveloped(&self) -> bool {
        !matches!(self, Self::CatalogUnavailable(_))
    }
}

impl From<CheckoutError> for ServiceError {
    fn from(err: CheckoutError) -> Self {
        match err {
            // Detail is logged where the failure happens; callers only see the kind
            CheckoutError::CatalogUnavailable(_) => ServiceError::ServiceUnavailable(
                "product catalog unavailable".to_string(),
            ),
            CheckoutError::InvalidRequest(detail) | CheckoutError::InvalidProduct(detail) => {
                ServiceError::BadRequest(detail)
            }
            CheckoutError::PersistenceFailure(detail) => ServiceError::InternalError(detail),
            CheckoutError::PaymentGatewayFailure(detail) => {
                ServiceError::ExternalServiceError(detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.message, "Not found: missing");
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("pool exhausted".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("syntax error near".into()))
                .response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::Unauthorized("bad token".into()).response_message(),
            "Unauthorized: bad token"
        );
    }

    #[test]
    fn checkout_error_messages_do_not_leak_detail() {
        let err = CheckoutError::PaymentGatewayFailure("status 500: card_declined".into());
        assert_eq!(err.caller_message(), "Unable to start payment session");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_enveloped());

        let err = CheckoutError::InvalidProduct("sku-9".into());
        assert_eq!(err.caller_message(), "Invalid product");
        assert_eq!(err.kind(), "invalid_product");
    }

    #[test]
    fn catalog_outage_is_not_enveloped() {
        let err = CheckoutError::CatalogUnavailable("connection refused".into());
        assert!(!err.is_enveloped());
        let service: ServiceError = err.into();
        assert_eq!(service.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
