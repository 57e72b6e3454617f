use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::rate_aggregator::RateAggregator;
use crate::errors::CoreError;
use crate::providers::registry::RateProviderRegistry;

/// Periodic background refresher. Optional: the resolver refreshes lazily
/// on its own, this only keeps the cache warm.
pub struct RefreshScheduler {
    aggregator: RateAggregator,
    providers: Arc<RateProviderRegistry>,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(
        aggregator: RateAggregator,
        providers: Arc<RateProviderRegistry>,
        period: Duration,
    ) -> Result<Self, CoreError> {
        if period.is_zero() {
            return Err(CoreError::Config("refresh interval must be positive".into()));
        }
        Ok(Self {
            aggregator,
            providers,
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One refresh across every provider.
    pub async fn run_once(&self) -> Result<usize, CoreError> {
        let providers = self.providers.all();
        self.aggregator.refresh(&providers).await
    }

    /// Refresh on every tick until `shutdown` resolves. Returns the number of
    /// runs that persisted a snapshot.
    ///
    /// The first tick fires immediately. Failed runs are logged and the loop
    /// keeps going.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut succeeded = 0usize;
        info!(period_secs = self.period.as_secs(), "refresh scheduler started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => match self.run_once().await {
                    Ok(count) => {
                        succeeded += 1;
                        debug!(count, "scheduled refresh done");
                    }
                    Err(e) => warn!(error = %e, "scheduled refresh failed"),
                },
            }
        }
        info!(succeeded, "refresh scheduler stopped");
        succeeded
    }
}
