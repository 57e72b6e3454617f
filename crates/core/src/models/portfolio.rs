use std::collections::BTreeMap;

use tracing::warn;

use super::wallet::Wallet;
use crate::errors::CoreError;
use crate::services::rate_resolver::RateLookup;

/// A user's set of wallets, keyed by currency code.
///
/// A currency absent from the map has no wallet at all, which is different
/// from a zero-balance wallet: it must be created before it can be credited.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    user_id: u64,
    wallets: BTreeMap<String, Wallet>,
}

/// One wallet's contribution to a portfolio valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationLine {
    pub code: String,
    pub balance: f64,
    /// Value in the base currency, `None` when no rate could be resolved.
    pub value: Option<f64>,
    pub error: Option<String>,
}

/// Result of valuing a whole portfolio in one base currency.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub base: String,
    /// Sum over the lines that could be valued.
    pub total: f64,
    pub lines: Vec<ValuationLine>,
}

impl PortfolioValuation {
    /// Lines whose value is missing.
    pub fn unvalued(&self) -> impl Iterator<Item = &ValuationLine> {
        self.lines.iter().filter(|l| l.value.is_none())
    }
}

impl Portfolio {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    pub fn from_wallets(user_id: u64, wallets: impl IntoIterator<Item = Wallet>) -> Self {
        let wallets = wallets
            .into_iter()
            .map(|w| (w.currency_code().to_string(), w))
            .collect();
        Self { user_id, wallets }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Defensive copy of all wallets. Mutating it never affects the portfolio.
    pub fn wallets(&self) -> BTreeMap<String, Wallet> {
        self.wallets.clone()
    }

    pub fn has_wallet(&self, code: &str) -> bool {
        self.wallets.contains_key(code)
    }

    /// Create a zero-balance wallet for `code`.
    pub fn add_currency(&mut self, code: &str) -> Result<&mut Wallet, CoreError> {
        if self.wallets.contains_key(code) {
            return Err(CoreError::DuplicateWallet(code.to_string()));
        }
        Ok(self
            .wallets
            .entry(code.to_string())
            .or_insert_with(|| Wallet::new(code)))
    }

    pub fn get_wallet(&self, code: &str) -> Result<&Wallet, CoreError> {
        self.wallets
            .get(code)
            .ok_or_else(|| CoreError::WalletNotFound(code.to_string()))
    }

    pub fn get_wallet_mut(&mut self, code: &str) -> Result<&mut Wallet, CoreError> {
        self.wallets
            .get_mut(code)
            .ok_or_else(|| CoreError::WalletNotFound(code.to_string()))
    }

    /// Locate the wallet for `code`, creating an empty one if absent.
    pub fn wallet_or_create(&mut self, code: &str) -> &mut Wallet {
        self.wallets
            .entry(code.to_string())
            .or_insert_with(|| Wallet::new(code))
    }

    /// Value every wallet in `base`.
    ///
    /// A wallet whose rate cannot be resolved is reported as an unvalued line;
    /// the total keeps summing the rest.
    pub async fn total_value(
        &self,
        base: &str,
        rates: &dyn RateLookup,
    ) -> Result<PortfolioValuation, CoreError> {
        let mut total = 0.0;
        let mut lines = Vec::with_capacity(self.wallets.len());

        for (code, wallet) in &self.wallets {
            let balance = wallet.balance();
            let line = if code == base {
                ValuationLine {
                    code: code.clone(),
                    balance,
                    value: Some(balance),
                    error: None,
                }
            } else {
                match rates.resolve(code, base).await {
                    Ok(resolved) => ValuationLine {
                        code: code.clone(),
                        balance,
                        value: Some(balance * resolved.rate),
                        error: None,
                    },
                    Err(e) => {
                        warn!(currency = %code, base = %base, error = %e, "wallet left unvalued");
                        ValuationLine {
                            code: code.clone(),
                            balance,
                            value: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            };
            total += line.value.unwrap_or(0.0);
            lines.push(line);
        }

        Ok(PortfolioValuation {
            base: base.to_string(),
            total,
            lines,
        })
    }
}
