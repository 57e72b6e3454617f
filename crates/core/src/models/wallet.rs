use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A single-currency balance. The balance never goes negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    currency_code: String,
    balance: f64,
}

fn check_amount(amount: f64) -> Result<(), CoreError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidAmount(amount))
    }
}

impl Wallet {
    /// An empty wallet.
    pub fn new(currency_code: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
            balance: 0.0,
        }
    }

    /// Restore a wallet from persisted state. Negative or non-finite balances
    /// are rejected.
    pub fn with_balance(currency_code: impl Into<String>, balance: f64) -> Result<Self, CoreError> {
        let currency_code = currency_code.into();
        if !balance.is_finite() || balance < 0.0 {
            return Err(CoreError::Validation(format!(
                "wallet {currency_code} has invalid balance {balance}"
            )));
        }
        Ok(Self {
            currency_code,
            balance,
        })
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn deposit(&mut self, amount: f64) -> Result<(), CoreError> {
        check_amount(amount)?;
        self.balance += amount;
        Ok(())
    }

    /// Withdraw the full `amount` or nothing.
    pub fn withdraw(&mut self, amount: f64) -> Result<(), CoreError> {
        check_amount(amount)?;
        if amount > self.balance {
            return Err(CoreError::InsufficientFunds {
                available: self.balance,
                required: amount,
                code: self.currency_code.clone(),
            });
        }
        self.balance -= amount;
        Ok(())
    }
}
