pub mod errors;
pub mod gateway;
pub mod order_status;
