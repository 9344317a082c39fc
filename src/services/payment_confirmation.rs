use crate::{
    entities::order::{self, PaymentStatus},
    errors::ServiceError,
    services::payment_gateway::CorrelationPayload,
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Subset of a gateway event this service needs
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: GatewayEventObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Session payment state: `paid`, `unpaid` or `no_payment_required`
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// What a delivered event did to the order store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The order moved out of `pending`
    Applied { order_id: Uuid, status: PaymentStatus },
    /// Redelivery; the order already left `pending`
    AlreadyProcessed { order_id: Uuid, status: PaymentStatus },
    UnknownOrder { order_id: Uuid },
    /// The order exists but belongs to someone else
    OwnerMismatch { order_id: Uuid },
    /// Session completed but funds have not settled yet
    AwaitingPayment,
    /// Event carries no usable correlation metadata
    Uncorrelated,
    /// Event type has no effect on orders
    Ignored,
}

impl ConfirmationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::AlreadyProcessed { .. } => "already_processed",
            Self::UnknownOrder { .. } => "unknown_order",
            Self::OwnerMismatch { .. } => "owner_mismatch",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Uncorrelated => "uncorrelated",
            Self::Ignored => "ignored",
        }
    }
}

/// Whether a session's `payment_status` means the funds are collected.
pub fn is_settled_payment(payment_status: Option<&str>) -> bool {
    matches!(payment_status, Some("paid") | Some("no_payment_required"))
}

/// Order status an event leads to, if any.
///
/// A completed session only settles the order when its payment is settled;
/// delayed methods report the outcome later through the async_payment events.
pub fn target_status(event_type: &str, payment_status: Option<&str>) -> Option<PaymentStatus> {
    match event_type {
        "checkout.session.completed" if is_settled_payment(payment_status) => {
            Some(PaymentStatus::Paid)
        }
        "checkout.session.async_payment_succeeded" => Some(PaymentStatus::Paid),
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            Some(PaymentStatus::Failed)
        }
        _ => None,
    }
}

/// Applies verified gateway confirmations to pending orders
#[derive(Clone)]
pub struct PaymentConfirmationService {
    db: Arc<DatabaseConnection>,
}

impl PaymentConfirmationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Transition the correlated order at most once.
    ///
    /// The update is conditional on the order still being `pending` and owned
    /// by the correlated user, so redeliveries change nothing.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn apply_event(
        &self,
        event: &GatewayEvent,
    ) -> Result<ConfirmationOutcome, ServiceError> {
        let outcome = self.apply(event).await?;
        counter!("checkout_confirmations_total", 1, "outcome" => outcome.label());
        Ok(outcome)
    }

    async fn apply(&self, event: &GatewayEvent) -> Result<ConfirmationOutcome, ServiceError> {
        let payment_status = event.data.object.payment_status.as_deref();
        let Some(status) = target_status(&event.event_type, payment_status) else {
            if event.event_type == "checkout.session.completed" {
                info!(?payment_status, "session completed without settled payment; order stays pending");
                return Ok(ConfirmationOutcome::AwaitingPayment);
            }
            info!("ignoring gateway event");
            return Ok(ConfirmationOutcome::Ignored);
        };

        let correlation = match CorrelationPayload::from_metadata(&event.data.object.metadata) {
            Ok(correlation) => correlation,
            Err(e) => {
                warn!(error = %e, "gateway event has no usable correlation");
                return Ok(ConfirmationOutcome::Uncorrelated);
            }
        };
        let order_id = correlation.order_id;

        let result = order::Entity::update_many()
            .col_expr(order::Column::PaymentStatus, Expr::value(status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::UserId.eq(correlation.user_id.as_str()))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            info!(%order_id, ?status, "order payment status updated");
            return Ok(ConfirmationOutcome::Applied { order_id, status });
        }

        match order::Entity::find_by_id(order_id).one(&*self.db).await? {
            None => {
                warn!(%order_id, "confirmation for unknown order");
                Ok(ConfirmationOutcome::UnknownOrder { order_id })
            }
            Some(existing) if existing.user_id != correlation.user_id => {
                warn!(%order_id, "confirmation owner does not match order owner");
                Ok(ConfirmationOutcome::OwnerMismatch { order_id })
            }
            Some(existing) => {
                info!(%order_id, status = ?existing.payment_status, "duplicate confirmation");
                Ok(ConfirmationOutcome::AlreadyProcessed {
                    order_id,
                    status: existing.payment_status,
                })
            }
        }
    }
}
