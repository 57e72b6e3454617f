pub mod atomic;
pub mod credentials;
pub mod portfolio_store;
pub mod rate_store;
pub mod user_store;
