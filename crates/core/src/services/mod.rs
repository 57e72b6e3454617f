pub mod rate_aggregator;
pub mod rate_resolver;
pub mod scheduler;
pub mod trade_service;
