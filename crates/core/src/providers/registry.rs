use crate::errors::CoreError;
use crate::models::currency::CurrencyKind;
use crate::models::settings::Settings;

use super::coingecko::CoinGeckoProvider;
use super::exchangerate::ExchangeRateApiProvider;
use super::traits::RateProvider;

/// Registry of all configured rate providers, in refresh order.
///
/// New providers can be added without modifying existing code.
pub struct RateProviderRegistry {
    providers: Vec<Box<dyn RateProvider>>,
}

impl RateProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Create a registry with the default providers: CoinGecko (crypto)
    /// followed by ExchangeRate-API (fiat).
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CoinGeckoProvider::new(settings)));
        registry.register(Box::new(ExchangeRateApiProvider::new(settings)));
        registry
    }

    /// Register a new rate provider.
    pub fn register(&mut self, provider: Box<dyn RateProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Every provider, in registration order.
    pub fn all(&self) -> Vec<&dyn RateProvider> {
        self.providers.iter().map(|p| p.as_ref()).collect()
    }

    /// Providers quoting one currency domain.
    pub fn for_kind(&self, kind: CurrencyKind) -> Vec<&dyn RateProvider> {
        self.providers
            .iter()
            .filter(|p| p.kind() == kind)
            .map(|p| p.as_ref())
            .collect()
    }

    /// Narrow the provider list by an optional source name.
    ///
    /// Matching ignores case and non-alphanumeric characters, so `coingecko`,
    /// `exchangerate` and `ExchangeRate-API` all work.
    pub fn select(&self, source: Option<&str>) -> Result<Vec<&dyn RateProvider>, CoreError> {
        let Some(source) = source else {
            return Ok(self.all());
        };
        let wanted = simplify(source);
        if wanted.is_empty() {
            return Err(CoreError::UnknownSource(source.to_string()));
        }
        let selected: Vec<&dyn RateProvider> = self
            .providers
            .iter()
            .filter(|p| simplify(p.name()).starts_with(&wanted))
            .map(|p| p.as_ref())
            .collect();
        if selected.is_empty() {
            return Err(CoreError::UnknownSource(source.to_string()));
        }
        Ok(selected)
    }
}

fn simplify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl Default for RateProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
