use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, PaymentStatus},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    /// Shipping address as submitted at checkout
    #[schema(value_type = Object)]
    pub address: Value,
    /// Cart lines as submitted at checkout
    #[schema(value_type = Object)]
    pub items: Value,
    /// Total including surcharge, in minor units
    pub amount: i64,
    pub payment_type: String,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<OrderModel> for OrderResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            address: model.address,
            items: model.items,
            amount: model.amount,
            payment_type: model.payment_type,
            payment_status: model.payment_status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read access to orders, always scoped to one owner
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Lists the owner's orders, newest first
    #[instrument(skip(self))]
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        if page == 0 {
            return Err(ServiceError::BadRequest("page starts at 1".to_string()));
        }
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(owner_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page, per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        info!(total, page, per_page, returned = orders.len(), "Orders listed");

        Ok(OrderListResponse {
            orders: orders.into_iter().map(OrderResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Fetches one order. Orders of other owners are reported as not found.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_for_owner(
        &self,
        owner_id: &str,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .filter(order::Column::UserId.eq(owner_id))
            .one(&*self.db_pool)
            .await?
            .map(OrderResponse::from)
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))
    }
}
