// Core services
pub mod orders;
pub mod payments;
pub mod production;

// Status helpers that work directly with entities
pub mod order_status;
