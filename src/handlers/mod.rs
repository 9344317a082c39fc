pub mod commerce;
pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        commerce::{CheckoutService, CheckoutSettings, PricingService, ProductCatalog},
        orders::OrderService,
        payment_confirmation::PaymentConfirmationService,
        payment_gateway::PaymentGateway,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payment_confirmation: Arc<PaymentConfirmationService>,
}

impl AppServices {
    /// Wire services over the given collaborators.
    ///
    /// The catalog and gateway are injected so tests can substitute fakes.
    pub fn new(
        db_pool: Arc<DbPool>,
        config: &AppConfig,
        catalog: Arc<dyn ProductCatalog>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let pricing = PricingService::new(catalog, config.catalog_lookup_concurrency);
        let checkout = Arc::new(CheckoutService::new(
            db_pool.clone(),
            pricing,
            gateway,
            CheckoutSettings::from(config),
        ));
        let orders = Arc::new(OrderService::new(db_pool.clone()));
        let payment_confirmation = Arc::new(PaymentConfirmationService::new(db_pool));

        Self {
            checkout,
            orders,
            payment_confirmation,
        }
    }
}
