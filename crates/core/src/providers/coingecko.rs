use async_trait::async_trait;
use reqwest::Client;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::debug;

use super::traits::RateProvider;
use super::{ensure_success, http_client, transport_error};
use crate::errors::CoreError;
use crate::models::currency::CurrencyKind;
use crate::models::settings::Settings;

const NAME: &str = "CoinGecko";

/// CoinGecko `/simple/price` provider for cryptocurrency rates.
///
/// - **Free**: no API key required.
/// - **Request**: `?ids=bitcoin,ethereum&vs_currencies=usd`
/// - **Response**: `{"bitcoin": {"usd": 59337.21}, ...}`
///
/// CoinGecko addresses coins by lowercase ids ("bitcoin"), so each configured
/// symbol is mapped through `crypto_id_map`. Results are keyed `BTC_USD`.
pub struct CoinGeckoProvider {
    client: Client,
    url: String,
    base: String,
    /// Uppercase symbol → CoinGecko id, only for configured symbols.
    ids: BTreeMap<String, String>,
}

impl CoinGeckoProvider {
    pub fn new(settings: &Settings) -> Self {
        let ids = settings
            .crypto_currencies
            .iter()
            .map(|s| s.to_uppercase())
            .filter_map(|sym| {
                let id = settings.crypto_id_map.get(&sym)?.clone();
                Some((sym, id))
            })
            .collect();
        Self {
            client: http_client(settings.request_timeout_secs),
            url: settings.coingecko_url.clone(),
            base: settings.base_currency.to_uppercase(),
            ids,
        }
    }

    /// The symbols this provider will request.
    pub fn symbols(&self) -> Vec<&str> {
        self.ids.keys().map(String::as_str).collect()
    }

    /// Map a `/simple/price` body into pair keys. Ids absent from the body are skipped.
    pub fn pairs_from_response(
        &self,
        body: &HashMap<String, HashMap<String, f64>>,
    ) -> HashMap<String, f64> {
        let vs = self.base.to_lowercase();
        self.ids
            .iter()
            .filter_map(|(symbol, id)| {
                let rate = body.get(id)?.get(&vs)?;
                Some((format!("{symbol}_{}", self.base), *rate))
            })
            .collect()
    }
}

#[async_trait]
impl RateProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CurrencyKind {
        CurrencyKind::Crypto
    }

    async fn fetch(&self) -> Result<HashMap<String, f64>, CoreError> {
        if self.ids.is_empty() {
            return Err(CoreError::unavailable(NAME, "no crypto currencies configured"));
        }
        let ids = self.ids.values().cloned().collect::<Vec<_>>().join(",");
        let vs = self.base.to_lowercase();
        let started = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .query(&[("ids", ids.as_str()), ("vs_currencies", vs.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(NAME, e, None))?;

        let body: HashMap<String, HashMap<String, f64>> = ensure_success(NAME, response)?
            .json()
            .await
            .map_err(|e| CoreError::unavailable(NAME, format!("malformed JSON response: {e}")))?;

        let rates = self.pairs_from_response(&body);
        debug!(
            provider = NAME,
            count = rates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched rates"
        );
        Ok(rates)
    }
}
