use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::rate_aggregator::RateAggregator;
use crate::errors::CoreError;
use crate::models::currency::validate_code;
use crate::models::rate::{RatePair, RateSnapshot, ResolvedRate};
use crate::models::settings::Settings;
use crate::providers::registry::RateProviderRegistry;
use crate::storage::rate_store::RateStore;

/// Anything that can answer "what is the rate from A to B".
///
/// Portfolio valuation and trading depend on this capability rather than on
/// the concrete resolver.
#[async_trait]
pub trait RateLookup: Send + Sync {
    async fn resolve(&self, from: &str, to: &str) -> Result<ResolvedRate, CoreError>;
}

/// One row of a cache listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRate {
    pub pair: String,
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

/// Read-only view of the cache, never triggering a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RateListing {
    pub source: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub rates: Vec<CachedRate>,
}

/// Resolves pair rates from the rate store, refreshing lazily.
///
/// Cache strategy:
/// - **Identity pairs**: always 1.0, the store is never touched.
/// - **Empty store**: refresh first.
/// - **Missing pair**: direct key, then the inverted reverse key; refresh if neither.
/// - **Stale pair** (`age > ttl`): refresh and look up again, serving the stale
///   value if the refresh cannot do better.
///
/// At most one refresh is attempted per `resolve` call, so an unsupported
/// pair cannot cause a refresh loop.
pub struct RateResolver {
    store: RateStore,
    aggregator: RateAggregator,
    providers: Arc<RateProviderRegistry>,
    ttl: TimeDelta,
}

impl RateResolver {
    pub fn new(store: RateStore, providers: Arc<RateProviderRegistry>, ttl: TimeDelta) -> Self {
        Self {
            aggregator: RateAggregator::new(store.clone()),
            store,
            providers,
            ttl,
        }
    }

    pub fn from_settings(settings: &Settings, providers: Arc<RateProviderRegistry>) -> Self {
        Self::new(RateStore::from_settings(settings), providers, settings.ttl())
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub fn store(&self) -> &RateStore {
        &self.store
    }

    pub fn aggregator(&self) -> &RateAggregator {
        &self.aggregator
    }

    pub fn providers(&self) -> &RateProviderRegistry {
        &self.providers
    }

    fn is_stale(&self, resolved: &ResolvedRate, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(resolved.updated_at) > self.ttl
    }

    /// Run one refresh across every provider, then reload. Refresh failures
    /// are logged and absorbed: the caller decides based on what is stored.
    async fn refresh_and_reload(&self, refreshed: &mut bool) -> Result<RateSnapshot, CoreError> {
        *refreshed = true;
        let providers = self.providers.all();
        match self.aggregator.refresh(&providers).await {
            Ok(count) => debug!(count, "on-demand refresh completed"),
            Err(e) => warn!(error = %e, "on-demand refresh failed"),
        }
        self.store.load()
    }

    /// Load the snapshot. A corrupt file gets one refresh to overwrite it.
    async fn load_or_repair(&self, refreshed: &mut bool) -> Result<RateSnapshot, CoreError> {
        match self.store.load() {
            Ok(snapshot) if snapshot.is_empty() => {
                info!("rate cache is empty, running initial refresh");
                self.refresh_and_reload(refreshed).await
            }
            Ok(snapshot) => Ok(snapshot),
            Err(CoreError::CorruptSnapshot(reason)) => {
                warn!(%reason, "rate cache is corrupt, refreshing to replace it");
                self.refresh_and_reload(refreshed).await
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `from → to` into `(rate, updated_at)`.
    pub async fn resolve(&self, from: &str, to: &str) -> Result<ResolvedRate, CoreError> {
        validate_code(from)?;
        validate_code(to)?;
        if from == to {
            return Ok(ResolvedRate {
                rate: 1.0,
                updated_at: Utc::now(),
            });
        }

        let pair = RatePair::new(from, to);
        let mut refreshed = false;
        let mut snapshot = self.load_or_repair(&mut refreshed).await?;

        let mut found = snapshot.lookup(&pair);
        if found.is_none() && !refreshed {
            info!(pair = %pair, "rate not cached, refreshing");
            snapshot = self.refresh_and_reload(&mut refreshed).await?;
            found = snapshot.lookup(&pair);
        }
        let Some(mut resolved) = found else {
            return Err(CoreError::RateNotFound {
                from: from.to_string(),
                to: to.to_string(),
            });
        };

        if self.is_stale(&resolved, Utc::now()) {
            if !refreshed {
                info!(pair = %pair, updated_at = %resolved.updated_at, "rate is stale, refreshing");
                snapshot = self.refresh_and_reload(&mut refreshed).await?;
                if let Some(fresh) = snapshot.lookup(&pair) {
                    resolved = fresh;
                }
            }
            if self.is_stale(&resolved, Utc::now()) {
                warn!(pair = %pair, updated_at = %resolved.updated_at, "serving stale rate");
            }
        } else {
            debug!(pair = %pair, "cache hit");
        }

        Ok(resolved)
    }

    /// List cached rates without refreshing.
    ///
    /// `currency` keeps only pairs quoted from that code. With `top`, rows are
    /// ordered by rate descending and truncated; otherwise by pair key.
    pub fn cached_rates(
        &self,
        currency: Option<&str>,
        top: Option<usize>,
    ) -> Result<RateListing, CoreError> {
        let snapshot = self.store.load()?;
        if snapshot.is_empty() {
            return Ok(RateListing {
                source: None,
                last_refresh: None,
                rates: Vec::new(),
            });
        }

        let mut rates: Vec<CachedRate> = snapshot
            .rates
            .iter()
            .filter(|(key, _)| match (currency, RatePair::parse(key)) {
                (Some(code), Some(pair)) => pair.from == code,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|(key, entry)| CachedRate {
                pair: key.clone(),
                rate: entry.rate,
                updated_at: entry.updated_at,
            })
            .collect();

        if let Some(top) = top {
            rates.sort_by(|a, b| b.rate.total_cmp(&a.rate));
            rates.truncate(top);
        }

        Ok(RateListing {
            source: snapshot.source,
            last_refresh: snapshot.last_refresh,
            rates,
        })
    }
}

#[async_trait]
impl RateLookup for RateResolver {
    async fn resolve(&self, from: &str, to: &str) -> Result<ResolvedRate, CoreError> {
        RateResolver::resolve(self, from, to).await
    }
}
