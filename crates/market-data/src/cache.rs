use advisor_core::{AdvisorError, PriceTable};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CACHE_EXPIRY_HOURS: i64 = 6;
const CACHE_FILE_NAME: &str = "etf_data_cache.json";

/// Persisted result of the last successful full fetch. Owned exclusively by
/// the gateway; read-only everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub price_data: PriceTable,
    pub tickers: Vec<String>,
    pub download_time: DateTime<Utc>,
    pub failed_tickers: Vec<String>,
}

/// Time-boxed on-disk snapshot store.
pub struct SnapshotCache {
    path: PathBuf,
    expiry: Duration,
}

impl SnapshotCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(CACHE_FILE_NAME),
            expiry: Duration::hours(CACHE_EXPIRY_HOURS),
        }
    }

    /// Last snapshot, or `None` when the file is missing, unreadable or
    /// older than the expiry window. Validity is judged by the stored
    /// `download_time`, not file mtime, so restored files age correctly.
    pub fn load(&self) -> Option<CacheSnapshot> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };

        let snapshot: CacheSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Discarding unreadable cache snapshot: {e}");
                return None;
            }
        };

        let age = Utc::now() - snapshot.download_time;
        if age >= self.expiry {
            tracing::info!(
                "Cache snapshot expired ({}h old, window {}h)",
                age.num_hours(),
                self.expiry.num_hours()
            );
            return None;
        }

        Some(snapshot)
    }

    /// Overwrites the prior snapshot. Written to a temp file first and moved
    /// into place so concurrent readers never observe a partial write.
    pub fn store(&self, snapshot: &CacheSnapshot) -> Result<(), AdvisorError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AdvisorError::Cache(format!("cannot create cache dir: {e}")))?;
        }

        let body = serde_json::to_string(snapshot)
            .map_err(|e| AdvisorError::Cache(format!("cannot serialize snapshot: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .map_err(|e| AdvisorError::Cache(format!("cannot write snapshot: {e}")))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AdvisorError::Cache(format!("cannot move snapshot into place: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::PriceSeries;
    use chrono::NaiveDate;

    fn sample_snapshot(download_time: DateTime<Utc>) -> CacheSnapshot {
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ];
        CacheSnapshot {
            price_data: PriceTable {
                series: vec![PriceSeries {
                    ticker: "SPY".into(),
                    dates,
                    closes: vec![470.0, 472.5],
                }],
            },
            tickers: vec!["SPY".into()],
            download_time,
            failed_tickers: vec![],
        }
    }

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let snapshot = sample_snapshot(Utc::now());
        cache.store(&snapshot).unwrap();

        let loaded = cache.load().expect("fresh snapshot loads");
        assert_eq!(loaded.tickers, vec!["SPY".to_string()]);
        assert_eq!(loaded.price_data.get("SPY").unwrap().closes, vec![470.0, 472.5]);
    }

    #[test]
    fn stale_snapshot_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let stale = sample_snapshot(Utc::now() - Duration::hours(CACHE_EXPIRY_HOURS + 1));
        cache.store(&stale).unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn missing_or_corrupt_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());
        assert!(cache.load().is_none());

        std::fs::write(dir.path().join(CACHE_FILE_NAME), "not json").unwrap();
        assert!(cache.load().is_none());
    }
}
