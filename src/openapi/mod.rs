use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Checkout API",
        version = "1.0.0",
        description = r#"
# Checkout API

Prices carts from trusted catalog data, records pending orders and hands payment
collection to the payment gateway. Gateway confirmations arrive through the
payment webhook and settle orders as `paid` or `failed`.

## Authentication

Caller endpoints require a bearer JWT issued by the identity provider:

```
Authorization: Bearer <your-jwt-token>
```

## Checkout responses

`POST /api/v1/checkout` always answers with `{ "success": bool, "url"?: string, "message"?: string }`.
Failure messages are fixed: `Invalid data`, `Invalid product`, `Unable to save order`,
`Unable to start payment session`.

Amounts are integer minor units.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Cart checkout"),
        (name = "Orders", description = "Order history"),
        (name = "Payments", description = "Payment gateway callbacks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::commerce::checkout::create_checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::services::commerce::CheckoutRequest,
            crate::services::commerce::CartLine,
            crate::handlers::commerce::checkout::CheckoutResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderListResponse,
            crate::entities::order::PaymentStatus,
            crate::handlers::payment_webhooks::WebhookAck,
            crate::handlers::health::HealthResponse,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
