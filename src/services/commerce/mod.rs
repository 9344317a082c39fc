/// Checkout orchestration: catalog lookup, pricing and order materialization
pub mod checkout_service;
pub mod pricing_service;
pub mod product_catalog_service;

pub use checkout_service::{
    CartLine, CheckoutOutcome, CheckoutRequest, CheckoutService, CheckoutSettings, RedirectTargets,
};
pub use pricing_service::{PricedCart, PricedLineItem, PricingService};
pub use product_catalog_service::{
    CatalogError, CatalogProduct, DbProductCatalog, InMemoryProductCatalog, ProductCatalog,
};
