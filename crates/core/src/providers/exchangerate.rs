use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

use super::traits::RateProvider;
use super::{ensure_success, http_client, transport_error};
use crate::errors::CoreError;
use crate::models::currency::CurrencyKind;
use crate::models::settings::Settings;

const NAME: &str = "ExchangeRate-API";

/// ExchangeRate-API v6 provider for fiat exchange rates.
///
/// - **Key**: required, passed as a path segment (`/{key}/latest/{BASE}`).
/// - **Response**: `{"result": "success", "rates": {"EUR": 0.92, ...}}`
///
/// The API quotes units of each currency per one unit of the base
/// (`USD → EUR = 0.92`). Only the configured fiat codes are kept, and each is
/// stored as the price of one unit in the base: `EUR_USD = 1 / 0.92`.
pub struct ExchangeRateApiProvider {
    client: Client,
    url: String,
    api_key: Option<String>,
    base: String,
    currencies: Vec<String>,
}

// ── ExchangeRate-API response types ─────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    pub result: String,
    #[serde(rename = "error-type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub rates: HashMap<String, f64>,
}

impl ExchangeRateApiProvider {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: http_client(settings.request_timeout_secs),
            url: settings.exchangerate_api_url.trim_end_matches('/').to_string(),
            api_key: settings
                .exchangerate_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            base: settings.base_currency.to_uppercase(),
            currencies: settings.fiat_currencies.iter().map(|c| c.to_uppercase()).collect(),
        }
    }

    /// Validate a parsed body and map it into pair keys.
    pub fn pairs_from_response(
        &self,
        body: &LatestResponse,
    ) -> Result<HashMap<String, f64>, CoreError> {
        if body.result != "success" {
            let kind = body.error_type.as_deref().unwrap_or("unknown");
            return Err(CoreError::unavailable(NAME, format!("API returned error: {kind}")));
        }
        Ok(self
            .currencies
            .iter()
            .filter(|code| **code != self.base)
            .filter_map(|code| {
                let per_base = *body.rates.get(code)?;
                if !per_base.is_finite() || per_base <= 0.0 {
                    return None;
                }
                Some((format!("{code}_{}", self.base), 1.0 / per_base))
            })
            .collect())
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> CurrencyKind {
        CurrencyKind::Fiat
    }

    async fn fetch(&self) -> Result<HashMap<String, f64>, CoreError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::unavailable(NAME, "missing API key (EXCHANGERATE_API_KEY)"))?;
        let url = format!("{}/{key}/latest/{}", self.url, self.base);
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(NAME, e, Some(key)))?;

        let body: LatestResponse = ensure_success(NAME, response)?
            .json()
            .await
            .map_err(|e| CoreError::unavailable(NAME, format!("malformed JSON response: {e}")))?;

        let rates = self.pairs_from_response(&body)?;
        debug!(
            provider = NAME,
            count = rates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched rates"
        );
        Ok(rates)
    }
}
