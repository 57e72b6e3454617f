use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::atomic;
use crate::errors::CoreError;
use crate::models::rate::{RatePair, RateHistoryRecord, RateSnapshot};
use crate::models::settings::Settings;

/// Label recorded in history when a snapshot carries no `source`.
const DEFAULT_SOURCE: &str = "ParserService";

/// Persisted rate cache: the current snapshot plus an append-only history.
///
/// Only the aggregator writes here; everything else reads.
#[derive(Debug, Clone)]
pub struct RateStore {
    rates_path: PathBuf,
    history_path: PathBuf,
}

impl RateStore {
    pub fn new(rates_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            rates_path: rates_path.into(),
            history_path: history_path.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.rates_path(), settings.history_path())
    }

    pub fn rates_path(&self) -> &Path {
        &self.rates_path
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// The persisted snapshot, or an empty one if nothing was ever saved.
    pub fn load(&self) -> Result<RateSnapshot, CoreError> {
        Ok(atomic::read_json(&self.rates_path, CoreError::CorruptSnapshot)?.unwrap_or_default())
    }

    /// Replace the snapshot wholesale, then append one history record per pair.
    ///
    /// Once the snapshot is on disk the save has happened: a failed history
    /// append is logged, not returned.
    pub fn save(&self, snapshot: &RateSnapshot) -> Result<(), CoreError> {
        atomic::locked(&self.rates_path, || atomic::write_json(&self.rates_path, snapshot))?;

        match self.append_history(snapshot) {
            Ok(appended) => debug!(
                pairs = snapshot.pair_count(),
                history_appended = appended,
                "rate snapshot saved"
            ),
            Err(e) => warn!(error = %e, "rate snapshot saved, history append failed"),
        }
        Ok(())
    }

    /// Append under the history lock so concurrent saves never drop records.
    fn append_history(&self, snapshot: &RateSnapshot) -> Result<usize, CoreError> {
        let source = snapshot.source.as_deref().unwrap_or(DEFAULT_SOURCE);
        atomic::locked(&self.history_path, || {
            let mut history = match self.history() {
                Ok(history) => history,
                Err(CoreError::CorruptSnapshot(reason)) => {
                    warn!(%reason, "history log is unreadable, starting a new one");
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            let before = history.len();
            history.extend(snapshot.rates.iter().filter_map(|(key, entry)| {
                let pair = RatePair::parse(key)?;
                Some(RateHistoryRecord {
                    id: Uuid::new_v4().to_string(),
                    from_currency: pair.from,
                    to_currency: pair.to,
                    rate: entry.rate,
                    timestamp: entry.updated_at,
                    source: source.to_string(),
                })
            }));
            atomic::write_json(&self.history_path, &history)?;
            Ok(history.len() - before)
        })
    }

    /// The full history log. Not consulted for rate decisions.
    pub fn history(&self) -> Result<Vec<RateHistoryRecord>, CoreError> {
        Ok(atomic::read_json(&self.history_path, CoreError::CorruptSnapshot)?.unwrap_or_default())
    }
}
