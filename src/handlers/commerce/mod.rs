/// Commerce API handlers module
pub mod checkout;

pub use checkout::checkout_routes;
