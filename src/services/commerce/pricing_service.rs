use super::checkout_service::CartLine;
use super::product_catalog_service::{CatalogError, ProductCatalog};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use utoipa::ToSchema;

/// Flat surcharge applied on top of the subtotal, in percent.
pub const SURCHARGE_PERCENT: u64 = 2;

/// Largest total an order row can hold.
pub const MAX_ORDER_TOTAL: u64 = i64::MAX as u64;

/// `floor(subtotal * 2%)`, computed without floating point.
pub fn surcharge_for(subtotal: u64) -> u64 {
    // The quotient is never larger than `subtotal`, so the narrowing cannot fail
    ((subtotal as u128 * SURCHARGE_PERCENT as u128) / 100) as u64
}

/// Subtotal plus surcharge, `None` if it does not fit an order row.
pub fn total_with_surcharge(subtotal: u64) -> Option<u64> {
    subtotal
        .checked_add(surcharge_for(subtotal))
        .filter(|total| *total <= MAX_ORDER_TOTAL)
}

/// A cart line priced from trusted catalog data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PricedLineItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: u64,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCart {
    pub items: Vec<PricedLineItem>,
    pub subtotal: u64,
    pub surcharge: u64,
    pub total: u64,
}

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("product {product_ref:?} at line {position} does not resolve")]
    UnknownProduct { product_ref: String, position: usize },

    #[error("line {position} has a non-positive quantity")]
    InvalidQuantity { position: usize },

    #[error("order total exceeds supported range")]
    Overflow,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Prices carts against a [`ProductCatalog`].
#[derive(Clone)]
pub struct PricingService {
    catalog: Arc<dyn ProductCatalog>,
    lookup_concurrency: usize,
}

impl PricingService {
    pub fn new(catalog: Arc<dyn ProductCatalog>, lookup_concurrency: usize) -> Self {
        Self {
            catalog,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Resolve every line and compute the trusted total.
    ///
    /// Lookups run concurrently up to `lookup_concurrency` but are consumed in
    /// input order, so the reported failure is always the first bad line.
    /// Lookups still in flight are dropped once a failure is seen.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn price_cart(&self, lines: &[CartLine]) -> Result<PricedCart, PricingError> {
        // Each lookup owns its line and catalog handle so the stream stays `Send + 'static`
        let catalog = Arc::clone(&self.catalog);
        let owned: Vec<(usize, CartLine)> = lines.iter().cloned().enumerate().collect();
        let mut lookups = stream::iter(owned)
            .map(move |(position, line)| {
                let catalog = Arc::clone(&catalog);
                async move {
                    let resolved = catalog.resolve(&line.product).await;
                    (position, line, resolved)
                }
            })
            .buffered(self.lookup_concurrency)
            .boxed();

        let mut items = Vec::with_capacity(lines.len());
        let mut subtotal: u64 = 0;

        while let Some((position, line, resolved)) = lookups.next().await {
            let product = resolved?.ok_or_else(|| PricingError::UnknownProduct {
                product_ref: line.product.clone(),
                position,
            })?;

            let quantity = u64::try_from(line.quantity)
                .ok()
                .filter(|q| *q > 0)
                .ok_or(PricingError::InvalidQuantity { position })?;

            let line_total = product
                .unit_price
                .checked_mul(quantity)
                .ok_or(PricingError::Overflow)?;
            subtotal = subtotal
                .checked_add(line_total)
                .ok_or(PricingError::Overflow)?;

            items.push(PricedLineItem {
                product_id: product.id,
                name: product.name,
                unit_price: product.unit_price,
                quantity,
            });
        }

        let surcharge = surcharge_for(subtotal);
        let total = total_with_surcharge(subtotal).ok_or(PricingError::Overflow)?;
        debug!(subtotal, surcharge, total, "cart priced");

        Ok(PricedCart {
            items,
            subtotal,
            surcharge,
            total,
        })
    }
}
