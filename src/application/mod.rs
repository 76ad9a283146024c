pub mod confirmation;
pub mod order_service;
