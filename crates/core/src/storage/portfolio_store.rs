use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::atomic;
use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::settings::Settings;
use crate::models::wallet::Wallet;

/// On-disk wallet: only the balance, the currency code is the map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub balance: f64,
}

/// On-disk portfolio: `{"user_id": 1, "wallets": {"USD": {"balance": 100.0}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    pub user_id: u64,
    #[serde(default)]
    pub wallets: BTreeMap<String, WalletRecord>,
}

impl From<&Portfolio> for PortfolioRecord {
    fn from(portfolio: &Portfolio) -> Self {
        Self {
            user_id: portfolio.user_id(),
            wallets: portfolio
                .wallets()
                .into_iter()
                .map(|(code, w)| (code, WalletRecord { balance: w.balance() }))
                .collect(),
        }
    }
}

impl TryFrom<PortfolioRecord> for Portfolio {
    type Error = CoreError;

    fn try_from(record: PortfolioRecord) -> Result<Self, CoreError> {
        let wallets = record
            .wallets
            .into_iter()
            .map(|(code, w)| Wallet::with_balance(code, w.balance))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Portfolio::from_wallets(record.user_id, wallets))
    }
}

/// All users' portfolios in one JSON list.
#[derive(Debug, Clone)]
pub struct PortfolioStore {
    path: PathBuf,
}

impl PortfolioStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.portfolios_path())
    }

    fn records(&self) -> Result<Vec<PortfolioRecord>, CoreError> {
        Ok(atomic::read_json(&self.path, CoreError::Deserialization)?.unwrap_or_default())
    }

    /// The user's portfolio, or an empty one if none is stored.
    pub fn load(&self, user_id: u64) -> Result<Portfolio, CoreError> {
        match self.records()?.into_iter().find(|r| r.user_id == user_id) {
            Some(record) => Portfolio::try_from(record),
            None => Ok(Portfolio::new(user_id)),
        }
    }

    /// Insert or replace the portfolio's record.
    ///
    /// Other users' records are re-read under the file lock, so concurrent
    /// saves for different users all survive.
    pub fn save(&self, portfolio: &Portfolio) -> Result<(), CoreError> {
        let record = PortfolioRecord::from(portfolio);
        atomic::locked(&self.path, || {
            let mut records = self.records()?;
            match records.iter_mut().find(|r| r.user_id == record.user_id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
            atomic::write_json(&self.path, &records)
        })
    }
}
