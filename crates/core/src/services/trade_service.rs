use tracing::{error, info, warn};

use super::rate_resolver::RateLookup;
use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::storage::portfolio_store::PortfolioStore;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeKind {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeKind::Buy => write!(f, "BUY"),
            TradeKind::Sell => write!(f, "SELL"),
        }
    }
}

/// What a trade did to the portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub kind: TradeKind,
    pub currency: String,
    pub amount: f64,
    pub base: String,
    /// Rate `currency → base` used, if a conversion happened.
    pub rate: Option<f64>,
    /// Cost (buy) or proceeds (sell) in the base currency.
    pub base_amount: Option<f64>,
    /// Balance of the traded currency's wallet before and after.
    pub balance_before: f64,
    pub balance_after: f64,
}

/// Result of a sell.
#[derive(Debug, Clone, PartialEq)]
pub enum SellOutcome {
    /// Principal debited and proceeds credited (or no conversion was needed).
    Settled(TradeReceipt),
    /// Principal debited and persisted, but the rate could not be resolved so
    /// nothing was credited. The debit is not rolled back.
    PartiallySettled { receipt: TradeReceipt, reason: String },
}

impl SellOutcome {
    pub fn receipt(&self) -> &TradeReceipt {
        match self {
            SellOutcome::Settled(receipt) => receipt,
            SellOutcome::PartiallySettled { receipt, .. } => receipt,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, SellOutcome::Settled(_))
    }
}

/// Outcome field of an audit record.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Ok,
    Partial { reason: String },
    Error { kind: &'static str, message: String },
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOutcome::Ok => write!(f, "OK"),
            AuditOutcome::Partial { .. } => write!(f, "PARTIAL"),
            AuditOutcome::Error { kind, .. } => write!(f, "ERROR({kind})"),
        }
    }
}

/// One audited trade attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeAudit {
    pub actor: String,
    pub kind: TradeKind,
    pub currency: String,
    pub amount: f64,
    pub base: String,
    pub outcome: AuditOutcome,
}

/// Receives every trade attempt, successful or not.
pub trait AuditSink: Send + Sync {
    fn record(&self, audit: &TradeAudit);
}

/// Writes audit records to the `valuta::audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, a: &TradeAudit) {
        match &a.outcome {
            AuditOutcome::Ok => info!(
                target: "valuta::audit",
                actor = %a.actor, kind = %a.kind, currency = %a.currency,
                amount = a.amount, base = %a.base, result = "OK",
                "trade"
            ),
            AuditOutcome::Partial { reason } => warn!(
                target: "valuta::audit",
                actor = %a.actor, kind = %a.kind, currency = %a.currency,
                amount = a.amount, base = %a.base, result = "PARTIAL", %reason,
                "trade"
            ),
            AuditOutcome::Error { kind, message } => error!(
                target: "valuta::audit",
                actor = %a.actor, kind = %a.kind, currency = %a.currency,
                amount = a.amount, base = %a.base, result = "ERROR",
                error_kind = *kind, %message,
                "trade"
            ),
        }
    }
}

fn check_amount(amount: f64) -> Result<(), CoreError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidAmount(amount))
    }
}

/// Executes buys and sells against one in-memory portfolio, persisting once
/// per operation after all mutation.
pub struct TradeService {
    base_currency: String,
    audit: Box<dyn AuditSink>,
}

impl TradeService {
    pub fn new(base_currency: impl Into<String>, audit: Box<dyn AuditSink>) -> Self {
        Self {
            base_currency: base_currency.into(),
            audit,
        }
    }

    /// A service that audits through `tracing`.
    pub fn with_tracing(base_currency: impl Into<String>) -> Self {
        Self::new(base_currency, Box::new(TracingAudit))
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    fn report(&self, actor: &str, kind: TradeKind, code: &str, amount: f64, outcome: AuditOutcome) {
        self.audit.record(&TradeAudit {
            actor: actor.to_string(),
            kind,
            currency: code.to_string(),
            amount,
            base: self.base_currency.clone(),
            outcome,
        });
    }

    /// Buy `amount` of `code`, paying from the base-currency wallet.
    ///
    /// The rate is resolved before any wallet is touched, so a resolution
    /// failure never leaves a debit without its credit.
    pub async fn buy(
        &self,
        actor: &str,
        portfolio: &mut Portfolio,
        store: &PortfolioStore,
        rates: &dyn RateLookup,
        code: &str,
        amount: f64,
    ) -> Result<TradeReceipt, CoreError> {
        let result = self.execute_buy(portfolio, store, rates, code, amount).await;
        let outcome = match &result {
            Ok(_) => AuditOutcome::Ok,
            Err(e) => AuditOutcome::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        };
        self.report(actor, TradeKind::Buy, code, amount, outcome);
        result
    }

    async fn execute_buy(
        &self,
        portfolio: &mut Portfolio,
        store: &PortfolioStore,
        rates: &dyn RateLookup,
        code: &str,
        amount: f64,
    ) -> Result<TradeReceipt, CoreError> {
        check_amount(amount)?;
        let base = self.base_currency.as_str();
        if code == base {
            return Err(CoreError::Validation(format!(
                "cannot buy the base currency {base}"
            )));
        }

        let resolved = rates.resolve(code, base).await?;
        let cost = amount * resolved.rate;

        let base_wallet = portfolio.get_wallet_mut(base)?;
        if base_wallet.balance() < cost {
            return Err(CoreError::InsufficientFunds {
                available: base_wallet.balance(),
                required: cost,
                code: base.to_string(),
            });
        }
        base_wallet.withdraw(cost)?;

        let target = portfolio.wallet_or_create(code);
        let balance_before = target.balance();
        target.deposit(amount)?;
        let balance_after = target.balance();

        store.save(portfolio)?;

        Ok(TradeReceipt {
            kind: TradeKind::Buy,
            currency: code.to_string(),
            amount,
            base: base.to_string(),
            rate: Some(resolved.rate),
            base_amount: Some(cost),
            balance_before,
            balance_after,
        })
    }

    /// Sell `amount` of `code`, crediting the proceeds to the base wallet.
    ///
    /// Funds are checked before any rate lookup. If the rate cannot be
    /// resolved after the debit, the debit is persisted anyway and the result
    /// is `SellOutcome::PartiallySettled`.
    pub async fn sell(
        &self,
        actor: &str,
        portfolio: &mut Portfolio,
        store: &PortfolioStore,
        rates: &dyn RateLookup,
        code: &str,
        amount: f64,
    ) -> Result<SellOutcome, CoreError> {
        let result = self.execute_sell(portfolio, store, rates, code, amount).await;
        let outcome = match &result {
            Ok(SellOutcome::Settled(_)) => AuditOutcome::Ok,
            Ok(SellOutcome::PartiallySettled { reason, .. }) => AuditOutcome::Partial {
                reason: reason.clone(),
            },
            Err(e) => AuditOutcome::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        };
        self.report(actor, TradeKind::Sell, code, amount, outcome);
        result
    }

    async fn execute_sell(
        &self,
        portfolio: &mut Portfolio,
        store: &PortfolioStore,
        rates: &dyn RateLookup,
        code: &str,
        amount: f64,
    ) -> Result<SellOutcome, CoreError> {
        check_amount(amount)?;
        let base = self.base_currency.as_str();

        let wallet = portfolio.get_wallet_mut(code)?;
        let balance_before = wallet.balance();
        wallet.withdraw(amount)?;
        let balance_after = wallet.balance();

        let mut receipt = TradeReceipt {
            kind: TradeKind::Sell,
            currency: code.to_string(),
            amount,
            base: base.to_string(),
            rate: None,
            base_amount: None,
            balance_before,
            balance_after,
        };

        if code == base {
            store.save(portfolio)?;
            return Ok(SellOutcome::Settled(receipt));
        }

        let resolved = match rates.resolve(code, base).await {
            Ok(resolved) => resolved,
            Err(e) => {
                store.save(portfolio)?;
                return Ok(SellOutcome::PartiallySettled {
                    receipt,
                    reason: e.to_string(),
                });
            }
        };

        let revenue = amount * resolved.rate;
        if revenue > 0.0 {
            portfolio.wallet_or_create(base).deposit(revenue)?;
        }
        store.save(portfolio)?;

        receipt.rate = Some(resolved.rate);
        receipt.base_amount = Some(revenue);
        Ok(SellOutcome::Settled(receipt))
    }
}
