pub mod errors;
pub mod logging;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use models::{
    currency::CurrencyRegistry,
    portfolio::{Portfolio, PortfolioValuation},
    rate::ResolvedRate,
    settings::Settings,
    user::UserInfo,
};
use providers::registry::RateProviderRegistry;
use services::{
    rate_resolver::{RateListing, RateResolver},
    scheduler::RefreshScheduler,
    trade_service::{AuditSink, SellOutcome, TradeReceipt, TradeService},
};
use storage::{
    credentials::KdfParams, portfolio_store::PortfolioStore, rate_store::RateStore,
    user_store::UserStore,
};

use errors::CoreError;

/// The logged-in user and their portfolio as last persisted.
#[derive(Debug, Clone)]
struct Session {
    user: UserInfo,
    portfolio: Portfolio,
}

/// Result of an explicit `refresh_rates` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport {
    /// Number of pairs written to the snapshot.
    pub updated: usize,
    pub source: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Main entry point of the core library.
///
/// Owns the settings, the provider registry, every store and service, and at
/// most one user session. Any front end (CLI, REPL, service) drives it.
#[must_use]
pub struct ValutaHub {
    settings: Settings,
    currencies: CurrencyRegistry,
    providers: Arc<RateProviderRegistry>,
    users: UserStore,
    portfolios: PortfolioStore,
    resolver: RateResolver,
    trades: TradeService,
    session: Option<Session>,
}

impl std::fmt::Debug for ValutaHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValutaHub")
            .field("base_currency", &self.settings.base_currency)
            .field("data_dir", &self.settings.data_dir)
            .field("providers", &self.providers.names())
            .field("user", &self.session.as_ref().map(|s| &s.user.username))
            .finish()
    }
}

impl ValutaHub {
    /// Wire the default providers (CoinGecko, ExchangeRate-API).
    pub fn new(settings: Settings) -> Result<Self, CoreError> {
        let providers = RateProviderRegistry::new_with_defaults(&settings);
        Self::with_providers(settings, providers)
    }

    /// Wire a custom provider registry.
    pub fn with_providers(
        settings: Settings,
        providers: RateProviderRegistry,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        let currencies = CurrencyRegistry::with_defaults();
        currencies.get(&settings.base_currency)?;

        let providers = Arc::new(providers);
        let resolver = RateResolver::new(
            RateStore::from_settings(&settings),
            Arc::clone(&providers),
            settings.ttl(),
        );
        Ok(Self {
            currencies,
            users: UserStore::from_settings(&settings),
            portfolios: PortfolioStore::from_settings(&settings),
            trades: TradeService::with_tracing(settings.base_currency.clone()),
            resolver,
            providers,
            settings,
            session: None,
        })
    }

    /// Replace the trade audit sink.
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.trades = TradeService::new(self.settings.base_currency.clone(), audit);
        self
    }

    /// Replace the Argon2 cost parameters used for new and existing users.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.users = self.users.with_kdf_params(kdf);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn currencies(&self) -> &CurrencyRegistry {
        &self.currencies
    }

    pub fn resolver(&self) -> &RateResolver {
        &self.resolver
    }

    /// A background refresher sharing this hub's providers and rate store.
    pub fn scheduler(&self) -> Result<RefreshScheduler, CoreError> {
        RefreshScheduler::new(
            self.resolver.aggregator().clone(),
            Arc::clone(&self.providers),
            Duration::from_secs(self.settings.refresh_interval_secs),
        )
    }

    // ── Users ───────────────────────────────────────────────────────

    /// Create a user and an empty portfolio holding a zero-balance wallet in
    /// the base currency. Does not log in.
    pub fn register(&mut self, username: &str, password: &str) -> Result<UserInfo, CoreError> {
        let user = self.users.create(username, password)?;
        let mut portfolio = Portfolio::new(user.user_id);
        portfolio.add_currency(&self.settings.base_currency)?;
        self.portfolios.save(&portfolio)?;
        Ok(user.info())
    }

    /// Verify credentials and load the user's portfolio. Replaces any
    /// current session.
    pub fn login(&mut self, username: &str, password: &str) -> Result<UserInfo, CoreError> {
        let user = self.users.verify(username, password)?.info();
        let portfolio = self.portfolios.load(user.user_id)?;
        info!(user_id = user.user_id, username = %user.username, "logged in");
        self.session = Some(Session {
            user: user.clone(),
            portfolio,
        });
        Ok(user)
    }

    /// End the session, returning who was logged in.
    pub fn logout(&mut self) -> Option<UserInfo> {
        self.session.take().map(|s| s.user)
    }

    pub fn current_user(&self) -> Option<&UserInfo> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// The logged-in user's portfolio.
    pub fn portfolio(&self) -> Result<&Portfolio, CoreError> {
        self.session
            .as_ref()
            .map(|s| &s.portfolio)
            .ok_or(CoreError::NotLoggedIn)
    }

    // ── Rates ───────────────────────────────────────────────────────

    /// Rate `from → to`, refreshing the cache if needed.
    pub async fn resolve_rate(&self, from: &str, to: &str) -> Result<ResolvedRate, CoreError> {
        let from = self.currencies.require(from)?;
        let to = self.currencies.require(to)?;
        self.resolver.resolve(&from, &to).await
    }

    /// Force a refresh, optionally from one named provider only.
    ///
    /// The snapshot is replaced by what the selected providers return, so a
    /// single-source refresh drops pairs only the others supply.
    pub async fn refresh_rates(&self, source: Option<&str>) -> Result<RefreshReport, CoreError> {
        let selected = self.providers.select(source)?;
        let updated = self.resolver.aggregator().refresh(&selected).await?;
        let snapshot = self.resolver.store().load()?;
        Ok(RefreshReport {
            updated,
            source: snapshot.source,
            last_refresh: snapshot.last_refresh,
        })
    }

    /// Cached rates without refreshing.
    pub fn show_rates(
        &self,
        currency: Option<&str>,
        top: Option<usize>,
    ) -> Result<RateListing, CoreError> {
        let currency = currency.map(|c| self.currencies.require(c)).transpose()?;
        self.resolver.cached_rates(currency.as_deref(), top)
    }

    // ── Portfolio ───────────────────────────────────────────────────

    /// Open an empty wallet for `code` and persist it.
    pub fn add_currency(&mut self, code: &str) -> Result<(), CoreError> {
        let code = self.currencies.require(code)?;
        let session = self.session.as_mut().ok_or(CoreError::NotLoggedIn)?;
        let mut working = session.portfolio.clone();
        working.add_currency(&code)?;
        self.portfolios.save(&working)?;
        session.portfolio = working;
        Ok(())
    }

    /// Buy `amount` of `code` with base currency.
    ///
    /// The trade runs on a copy of the session portfolio that replaces it
    /// only on success, so a failed trade leaves memory matching disk.
    pub async fn buy(&mut self, code: &str, amount: f64) -> Result<TradeReceipt, CoreError> {
        let session = self.session.as_mut().ok_or(CoreError::NotLoggedIn)?;
        let code = self.currencies.require(code)?;
        let mut working = session.portfolio.clone();
        let receipt = self
            .trades
            .buy(
                &session.user.username,
                &mut working,
                &self.portfolios,
                &self.resolver,
                &code,
                amount,
            )
            .await?;
        session.portfolio = working;
        Ok(receipt)
    }

    /// Sell `amount` of `code` for base currency.
    pub async fn sell(&mut self, code: &str, amount: f64) -> Result<SellOutcome, CoreError> {
        let session = self.session.as_mut().ok_or(CoreError::NotLoggedIn)?;
        let code = self.currencies.require(code)?;
        let mut working = session.portfolio.clone();
        let outcome = self
            .trades
            .sell(
                &session.user.username,
                &mut working,
                &self.portfolios,
                &self.resolver,
                &code,
                amount,
            )
            .await?;
        session.portfolio = working;
        Ok(outcome)
    }

    /// Value the session portfolio in `base`, or in the configured base
    /// currency when none is given.
    pub async fn portfolio_value(&self, base: Option<&str>) -> Result<PortfolioValuation, CoreError> {
        let session = self.session.as_ref().ok_or(CoreError::NotLoggedIn)?;
        let base = match base {
            Some(code) => self.currencies.require(code)?,
            None => self.settings.base_currency.clone(),
        };
        session.portfolio.total_value(&base, &self.resolver).await
    }
}
