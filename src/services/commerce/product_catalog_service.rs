use crate::entities::product;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Trusted catalog data for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    /// Unit price in integer minor units
    pub unit_price: u64,
}

/// The catalog could not be consulted. Distinct from "not found".
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only product lookup used to price carts.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` means the reference does not resolve to a sellable product.
    async fn resolve(&self, product_ref: &str) -> Result<Option<CatalogProduct>, CatalogError>;
}

/// Catalog backed by the `products` table
#[derive(Clone)]
pub struct DbProductCatalog {
    db: Arc<DatabaseConnection>,
}

impl DbProductCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductCatalog for DbProductCatalog {
    #[instrument(skip(self))]
    async fn resolve(&self, product_ref: &str) -> Result<Option<CatalogProduct>, CatalogError> {
        let row = product::Entity::find_by_id(product_ref.to_string())
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let Some(row) = row else {
            debug!(product_ref, "product not found or inactive");
            return Ok(None);
        };

        // Negative prices are a data error, not a missing product
        let unit_price = u64::try_from(row.unit_price).map_err(|_| {
            CatalogError::Unavailable(format!(
                "product {} has negative unit price {}",
                row.id, row.unit_price
            ))
        })?;

        Ok(Some(CatalogProduct {
            id: row.id,
            name: row.name,
            unit_price,
        }))
    }
}

/// Fixed in-process catalog, for tooling and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    products: HashMap<String, CatalogProduct>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, id: &str, name: &str, unit_price: u64) -> Self {
        self.products.insert(
            id.to_string(),
            CatalogProduct {
                id: id.to_string(),
                name: name.to_string(),
                unit_price,
            },
        );
        self
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn resolve(&self, product_ref: &str) -> Result<Option<CatalogProduct>, CatalogError> {
        Ok(self.products.get(product_ref).cloned())
    }
}
