use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An ordered currency pair. `BTC_USD` and `USD_BTC` are distinct pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RatePair {
    pub from: String,
    pub to: String,
}

impl RatePair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Storage key, e.g. `"BTC_USD"`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }

    /// Parse a `"FROM_TO"` key. Returns `None` unless there are exactly two
    /// non-empty halves.
    pub fn parse(key: &str) -> Option<Self> {
        let (from, to) = key.split_once('_')?;
        if from.is_empty() || to.is_empty() || to.contains('_') {
            return None;
        }
        Some(Self::new(from, to))
    }

    pub fn reverse(&self) -> Self {
        Self::new(self.to.clone(), self.from.clone())
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

impl std::fmt::Display for RatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}→{}", self.from, self.to)
    }
}

/// A cached rate: 1 unit of `from` = `rate` units of `to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

/// The answer to "what is the rate from A to B".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRate {
    pub rate: f64,
    pub updated_at: DateTime<Utc>,
}

/// Full persisted state of the rate cache.
///
/// Serialized with the pair keys at the top level next to `source` and
/// `last_refresh`:
/// ```json
/// { "BTC_USD": { "rate": 59337.21, "updated_at": "2025-10-10T12:00:00Z" },
///   "source": "CoinGecko", "last_refresh": "2025-10-10T12:00:00Z" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    /// Provenance label of the aggregation run that produced this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// When the last aggregation run happened. `None` means uninitialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub rates: BTreeMap<String, RateEntry>,
}

impl RateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot without `last_refresh` is empty regardless of its contents.
    pub fn is_empty(&self) -> bool {
        self.last_refresh.is_none()
    }

    pub fn get(&self, pair: &RatePair) -> Option<&RateEntry> {
        self.rates.get(&pair.key())
    }

    pub fn insert(&mut self, pair: &RatePair, entry: RateEntry) {
        self.rates.insert(pair.key(), entry);
    }

    /// Direct lookup, falling back to the inverted reverse pair.
    /// The inverse carries the same `updated_at` as its source entry.
    pub fn lookup(&self, pair: &RatePair) -> Option<ResolvedRate> {
        if let Some(entry) = self.get(pair) {
            return Some(ResolvedRate {
                rate: entry.rate,
                updated_at: entry.updated_at,
            });
        }
        self.get(&pair.reverse()).map(|entry| ResolvedRate {
            rate: 1.0 / entry.rate,
            updated_at: entry.updated_at,
        })
    }

    /// Number of cached pairs.
    pub fn pair_count(&self) -> usize {
        self.rates.len()
    }
}

/// One append-only history line, written per pair on every saved snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateHistoryRecord {
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_malformed_keys() {
        assert!(RatePair::parse("BTCUSD").is_none());
        assert!(RatePair::parse("_USD").is_none());
        assert!(RatePair::parse("BTC_").is_none());
        assert!(RatePair::parse("A_B_C").is_none());
        assert_eq!(RatePair::parse("BTC_USD"), Some(RatePair::new("BTC", "USD")));
    }

    #[test]
    fn snapshot_json_keeps_pairs_at_top_level() {
        let json = r#"{
            "EUR_USD": {"rate": 1.08, "updated_at": "2025-10-10T12:00:00+00:00"},
            "source": "ExchangeRate-API",
            "last_refresh": "2025-10-10T12:00:00+00:00"
        }"#;
        let snap: RateSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.source.as_deref(), Some("ExchangeRate-API"));
        assert!(!snap.is_empty());
        assert_eq!(snap.pair_count(), 1);
        assert_eq!(snap.rates["EUR_USD"].rate, 1.08);
    }
}
