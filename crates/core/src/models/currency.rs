use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::CoreError;

/// The domain a currency belongs to.
/// Determines which rate provider is responsible for quoting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    /// Government-issued money (USD, EUR, ...), quoted by ExchangeRate-API
    Fiat,
    /// Cryptocurrencies (BTC, ETH, ...), quoted by CoinGecko
    Crypto,
}

impl std::fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrencyKind::Fiat => write!(f, "Fiat"),
            CurrencyKind::Crypto => write!(f, "Crypto"),
        }
    }
}

/// Kind-specific display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CurrencyDetails {
    Fiat { issuing_country: String },
    Crypto { algorithm: String, market_cap: f64 },
}

/// A supported currency. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    code: String,
    name: String,
    details: CurrencyDetails,
}

/// Check that `code` is 2–5 uppercase characters with no whitespace.
pub fn validate_code(code: &str) -> Result<(), CoreError> {
    let len = code.chars().count();
    let well_formed = (2..=5).contains(&len)
        && !code.chars().any(char::is_whitespace)
        && code.chars().any(char::is_alphabetic)
        && code == code.to_uppercase();
    if well_formed {
        Ok(())
    } else {
        Err(CoreError::InvalidCurrencyCode(code.to_string()))
    }
}

/// Trim and uppercase user input, then validate the result.
pub fn normalize_code(input: &str) -> Result<String, CoreError> {
    let code = input.trim().to_uppercase();
    validate_code(&code)?;
    Ok(code)
}

impl Currency {
    pub fn fiat(
        code: impl Into<String>,
        name: impl Into<String>,
        issuing_country: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let issuing_country = issuing_country.into();
        if issuing_country.trim().is_empty() {
            return Err(CoreError::Validation("issuing country must not be empty".into()));
        }
        Self::new(code.into(), name.into(), CurrencyDetails::Fiat { issuing_country })
    }

    pub fn crypto(
        code: impl Into<String>,
        name: impl Into<String>,
        algorithm: impl Into<String>,
        market_cap: f64,
    ) -> Result<Self, CoreError> {
        let algorithm = algorithm.into();
        if algorithm.trim().is_empty() {
            return Err(CoreError::Validation("algorithm must not be empty".into()));
        }
        if !market_cap.is_finite() || market_cap < 0.0 {
            return Err(CoreError::Validation(format!(
                "market cap must be non-negative, got {market_cap}"
            )));
        }
        Self::new(
            code.into(),
            name.into(),
            CurrencyDetails::Crypto { algorithm, market_cap },
        )
    }

    fn new(code: String, name: String, details: CurrencyDetails) -> Result<Self, CoreError> {
        validate_code(&code)?;
        if name.trim().is_empty() {
            return Err(CoreError::Validation("currency name must not be empty".into()));
        }
        Ok(Self { code, name, details })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn details(&self) -> &CurrencyDetails {
        &self.details
    }

    pub fn kind(&self) -> CurrencyKind {
        match self.details {
            CurrencyDetails::Fiat { .. } => CurrencyKind::Fiat,
            CurrencyDetails::Crypto { .. } => CurrencyKind::Crypto,
        }
    }

    /// One-line description for UI and logs.
    pub fn display_info(&self) -> String {
        match &self.details {
            CurrencyDetails::Fiat { issuing_country } => {
                format!("[FIAT] {} — {} (Issuing: {issuing_country})", self.code, self.name)
            }
            CurrencyDetails::Crypto { algorithm, market_cap } => format!(
                "[CRYPTO] {} — {} (Algo: {algorithm}, MCAP: {market_cap:.2e})",
                self.code, self.name
            ),
        }
    }
}

/// Static catalog of supported currencies, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<String, Currency>,
}

impl CurrencyRegistry {
    /// Build a registry from an explicit list. Later duplicates are rejected.
    pub fn new(currencies: Vec<Currency>) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for currency in currencies {
            let code = currency.code().to_string();
            if map.insert(code.clone(), currency).is_some() {
                return Err(CoreError::Validation(format!(
                    "currency '{code}' registered twice"
                )));
            }
        }
        Ok(Self { currencies: map })
    }

    /// The built-in catalog: USD, EUR, GBP, RUB, BTC, ETH, SOL.
    pub fn with_defaults() -> Self {
        let defaults = [
            Currency::fiat("USD", "US Dollar", "United States"),
            Currency::fiat("EUR", "Euro", "Eurozone"),
            Currency::fiat("GBP", "British Pound", "United Kingdom"),
            Currency::fiat("RUB", "Russian Ruble", "Russia"),
            Currency::crypto("BTC", "Bitcoin", "SHA-256", 1.12e12),
            Currency::crypto("ETH", "Ethereum", "Ethash", 3.9e11),
            Currency::crypto("SOL", "Solana", "Proof of History", 6.5e10),
        ];
        let currencies = defaults
            .into_iter()
            .filter_map(Result::ok)
            .map(|c| (c.code().to_string(), c))
            .collect();
        Self { currencies }
    }

    /// Look up a currency by code. The input is normalized first.
    pub fn get(&self, code: &str) -> Result<&Currency, CoreError> {
        let code = normalize_code(code)?;
        self.currencies
            .get(&code)
            .ok_or(CoreError::CurrencyNotFound(code))
    }

    /// Normalize `code` and confirm it is registered.
    pub fn require(&self, code: &str) -> Result<String, CoreError> {
        self.get(code).map(|c| c.code().to_string())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_ok()
    }

    /// All codes of one kind, sorted.
    pub fn codes_of(&self, kind: CurrencyKind) -> Vec<&str> {
        self.currencies
            .values()
            .filter(|c| c.kind() == kind)
            .map(Currency::code)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }
}
