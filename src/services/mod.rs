pub mod commerce;
pub mod orders;
pub mod payment_confirmation;
pub mod payment_gateway;
