use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::currency::validate_code;
use crate::errors::CoreError;

/// Environment variable that overrides `exchangerate_api_key`.
pub const EXCHANGERATE_API_KEY_ENV: &str = "EXCHANGERATE_API_KEY";

/// Runtime configuration, constructed once and passed into every service.
///
/// Every field has a default, so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Currency in which portfolio value and trade proceeds are denominated.
    pub base_currency: String,

    /// Maximum age of a cached rate before it is refreshed on use.
    pub rates_ttl_seconds: u64,

    /// Timeout applied to every provider HTTP request.
    pub request_timeout_secs: u64,

    /// Interval of the optional background refresher.
    pub refresh_interval_secs: u64,

    pub coingecko_url: String,
    pub exchangerate_api_url: String,

    /// ExchangeRate-API key. The environment variable wins over the file.
    pub exchangerate_api_key: Option<String>,

    pub fiat_currencies: Vec<String>,
    pub crypto_currencies: Vec<String>,

    /// Symbol → CoinGecko coin id (BTC → bitcoin).
    pub crypto_id_map: BTreeMap<String, String>,

    /// Directory holding all persisted JSON files.
    pub data_dir: PathBuf,
    pub rates_file: String,
    pub history_file: String,
    pub users_file: String,
    pub portfolios_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        let crypto_id_map = [("BTC", "bitcoin"), ("ETH", "ethereum"), ("SOL", "solana")]
            .into_iter()
            .map(|(s, id)| (s.to_string(), id.to_string()))
            .collect();
        Self {
            base_currency: "USD".to_string(),
            rates_ttl_seconds: 3600,
            request_timeout_secs: 10,
            refresh_interval_secs: 3600,
            coingecko_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
            exchangerate_api_url: "https://v6.exchangerate-api.com/v6".to_string(),
            exchangerate_api_key: None,
            fiat_currencies: vec!["EUR".into(), "GBP".into(), "RUB".into()],
            crypto_currencies: vec!["BTC".into(), "ETH".into(), "SOL".into()],
            crypto_id_map,
            data_dir: PathBuf::from("data"),
            rates_file: "rates.json".to_string(),
            history_file: "exchange_rates.json".to_string(),
            users_file: "users.json".to_string(),
            portfolios_file: "portfolios.json".to_string(),
        }
    }
}

impl Settings {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load settings from a JSON file. A missing file yields the defaults.
    /// The API key environment variable is applied on top either way.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let mut settings = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str::<Settings>(&text)
                .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        if let Ok(key) = std::env::var(EXCHANGERATE_API_KEY_ENV) {
            if !key.trim().is_empty() {
                settings.exchangerate_api_key = Some(key);
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_code(&self.base_currency)
            .map_err(|_| CoreError::Config(format!("invalid base currency '{}'", self.base_currency)))?;
        if self.rates_ttl_seconds == 0 {
            return Err(CoreError::Config("rates_ttl_seconds must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config("request_timeout_secs must be positive".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(CoreError::Config("refresh_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn rates_path(&self) -> PathBuf {
        self.data_dir.join(&self.rates_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }

    pub fn portfolios_path(&self) -> PathBuf {
        self.data_dir.join(&self.portfolios_file)
    }

    pub fn ttl(&self) -> chrono::TimeDelta {
        i64::try_from(self.rates_ttl_seconds)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }
}
