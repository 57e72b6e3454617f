use chrono::Utc;

use tracing::{info, warn};

use crate::errors::CoreError;
use crate::models::currency::validate_code;
use crate::models::rate::{RateEntry, RatePair, RateSnapshot};
use crate::providers::traits::RateProvider;
use crate::storage::rate_store::RateStore;

/// Polls every provider, merges what succeeded, and commits one snapshot.
///
/// - A failing provider is logged and skipped; the rest still count.
/// - Every entry of one run shares the same `updated_at`.
/// - If no provider yields a single usable pair the run fails with
///   `NoRatesAvailable` and the stored snapshot is left untouched.
#[derive(Debug, Clone)]
pub struct RateAggregator {
    store: RateStore,
}

impl RateAggregator {
    pub fn new(store: RateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RateStore {
        &self.store
    }

    /// Refresh from `providers` and return the number of pairs persisted.
    pub async fn refresh(&self, providers: &[&dyn RateProvider]) -> Result<usize, CoreError> {
        let now = Utc::now();
        let mut snapshot = RateSnapshot::new();
        let mut contributors = Vec::new();

        for provider in providers {
            let name = provider.name();
            let rates = match provider.fetch().await {
                Ok(rates) => rates,
                Err(e) => {
                    warn!(provider = name, error = %e, "provider failed, skipping");
                    continue;
                }
            };

            let mut accepted = 0usize;
            for (key, &rate) in &rates {
                match usable_pair(key, rate) {
                    Some(pair) => {
                        snapshot.insert(&pair, RateEntry { rate, updated_at: now });
                        accepted += 1;
                    }
                    None => {
                        warn!(provider = name, pair = %key, rate, "discarding unusable rate");
                    }
                }
            }

            if accepted > 0 {
                contributors.push(name.to_string());
            } else {
                warn!(provider = name, "provider returned no usable rates");
            }
        }

        if snapshot.rates.is_empty() {
            warn!(providers = providers.len(), "no rates from any provider; keeping previous snapshot");
            return Err(CoreError::NoRatesAvailable);
        }

        snapshot.source = Some(contributors.join(", "));
        snapshot.last_refresh = Some(now);
        let count = snapshot.pair_count();
        self.store.save(&snapshot)?;

        info!(
            providers = providers.len(),
            contributors = contributors.len(),
            count,
            last_refresh = %now,
            "rates refreshed"
        );
        Ok(count)
    }
}

/// A pair is kept only if its key parses into two well-formed, distinct
/// codes and its rate is a positive finite number.
fn usable_pair(key: &str, rate: f64) -> Option<RatePair> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    let pair = RatePair::parse(key)?;
    if pair.is_identity() || validate_code(&pair.from).is_err() || validate_code(&pair.to).is_err() {
        return None;
    }
    Some(pair)
}
