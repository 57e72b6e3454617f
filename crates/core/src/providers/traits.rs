use async_trait::async_trait;
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::currency::CurrencyKind;

/// Trait abstraction for all rate sources.
///
/// Each provider quotes only its own currency domain, always against one
/// configured base currency, so providers never need to know about each
/// other. Any failure (network, auth, malformed body, rate limit) surfaces
/// as `CoreError::ProviderUnavailable`.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Human-readable name of this provider (for logs and provenance).
    fn name(&self) -> &str;

    /// The currency domain this provider quotes.
    fn kind(&self) -> CurrencyKind;

    /// Fetch a batch of `"FROM_TO"` → rate values.
    async fn fetch(&self) -> Result<HashMap<String, f64>, CoreError>;
}
