pub mod activity_cache;
pub mod audit;
pub mod order_reconciler;
