use crate::{
    auth::AuthUser,
    handlers::common::PaginationParams,
    services::orders::{OrderListResponse, OrderResponse},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

/// Creates the router for order history endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
}

/// List the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Paginated list of the caller's orders, newest first",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = OrderListResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request parameters", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> ApiResult<OrderListResponse> {
    let orders = state
        .services
        .orders
        .list_for_owner(&user.user_id, params.page, params.per_page)
        .await?;

    Ok(Json(ApiResponse::success(orders)))
}

/// Get one of the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = OrderResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .get_for_owner(&user.user_id, id)
        .await?;

    Ok(Json(ApiResponse::success(order)))
}
