//! Market data gateway: cache-first retrieval of daily close series for a
//! ticker universe, with bounded per-ticker retries and gap normalization.

pub mod cache;
pub mod provider;

pub use cache::{CacheSnapshot, SnapshotCache, CACHE_EXPIRY_HOURS};
pub use provider::YahooChartProvider;

use advisor_core::{MarketDataProvider, PriceSeries, PriceTable};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_RETRIES: usize = 3;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;

/// Partitioned result of one universe fetch. Per-ticker failures are
/// collected here, never raised; the caller decides whether the surviving
/// set is large enough to proceed.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub prices: PriceTable,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// True when the outcome was served from the snapshot cache.
    pub from_cache: bool,
}

pub struct MarketDataGateway {
    provider: Arc<dyn MarketDataProvider>,
    cache: SnapshotCache,
    max_retries: usize,
}

impl MarketDataGateway {
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: SnapshotCache) -> Self {
        Self {
            provider,
            cache,
            max_retries: MAX_RETRIES,
        }
    }

    /// Fetches close series for `tickers` over [start, end].
    ///
    /// A valid cache snapshot whose ticker set covers the request is served
    /// directly without network access. Otherwise each ticker is attempted up
    /// to `max_retries` times and the successful subset is persisted as the
    /// new snapshot.
    pub async fn fetch(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> FetchOutcome {
        if let Some(snapshot) = self.cache.load() {
            let cached: HashSet<&str> = snapshot.tickers.iter().map(|s| s.as_str()).collect();
            if tickers.iter().all(|tk| cached.contains(tk.as_str())) {
                let prices = snapshot.price_data.select(tickers);
                let succeeded = prices.tickers();
                tracing::info!("Serving {} tickers from cache snapshot", succeeded.len());
                return FetchOutcome {
                    prices,
                    succeeded,
                    failed: Vec::new(),
                    from_cache: true,
                };
            }
        }

        tracing::info!(
            "Downloading {} tickers ({} to {})",
            tickers.len(),
            start,
            end
        );

        let mut prices = PriceTable::default();
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for ticker in tickers {
            match self.fetch_one(ticker, start, end).await {
                Some(series) => {
                    prices.push(series);
                    succeeded.push(ticker.clone());
                }
                None => failed.push(ticker.clone()),
            }
        }

        if !prices.is_empty() {
            let snapshot = CacheSnapshot {
                price_data: prices.clone(),
                tickers: succeeded.clone(),
                download_time: Utc::now(),
                failed_tickers: failed.clone(),
            };
            if let Err(e) = self.cache.store(&snapshot) {
                // A cache write failure must not fail the fetch.
                tracing::warn!("Failed to persist cache snapshot: {e}");
            }
        }

        FetchOutcome {
            prices,
            succeeded,
            failed,
            from_cache: false,
        }
    }

    /// One ticker with bounded retries; `None` when every attempt produced
    /// an unusable series.
    async fn fetch_one(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Option<PriceSeries> {
        for attempt in 1..=self.max_retries {
            match self.provider.fetch_series(ticker, start, end).await {
                Ok(raw) => {
                    if let Some(series) = normalize_series(raw) {
                        return Some(series);
                    }
                    tracing::debug!("{ticker}: unusable series on attempt {attempt}");
                }
                Err(e) => {
                    tracing::debug!("{ticker}: attempt {attempt} failed: {e}");
                }
            }
        }
        tracing::warn!("{ticker}: exhausted {} attempts", self.max_retries);
        None
    }

    /// Average of the provider's risk-free proxy over the window, converted
    /// from percent to a fraction. Falls back to a constant and never errors.
    pub async fn fetch_risk_free_rate(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        match self.provider.fetch_risk_free_proxy(start, end).await {
            Ok(observations) => {
                let finite: Vec<f64> = observations.into_iter().filter(|v| v.is_finite()).collect();
                if finite.is_empty() {
                    tracing::warn!("Risk-free proxy returned no usable observations, using default");
                    return DEFAULT_RISK_FREE_RATE;
                }
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                let rate = mean / 100.0;
                if rate.is_finite() {
                    rate
                } else {
                    DEFAULT_RISK_FREE_RATE
                }
            }
            Err(e) => {
                tracing::warn!("Risk-free proxy unavailable ({e}), using default");
                DEFAULT_RISK_FREE_RATE
            }
        }
    }
}

/// Cleans one raw series: non-finite closes become gaps, interior gaps are
/// linearly interpolated, edges are forward- then backward-filled, and the
/// date index is deduplicated keeping the first entry. `None` when fewer
/// than 2 valid observations exist.
fn normalize_series(raw: PriceSeries) -> Option<PriceSeries> {
    if raw.dates.len() != raw.closes.len() || raw.is_empty() {
        return None;
    }

    let mut values: Vec<Option<f64>> = raw
        .closes
        .iter()
        .map(|c| if c.is_finite() { Some(*c) } else { None })
        .collect();

    let valid: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
    if valid.len() < 2 {
        return None;
    }

    // Interior gaps: straight line between the surrounding valid points.
    for pair in valid.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo > 1 {
            let a = values[lo].unwrap_or(0.0);
            let b = values[hi].unwrap_or(0.0);
            let span = (hi - lo) as f64;
            for k in (lo + 1)..hi {
                let t = (k - lo) as f64 / span;
                values[k] = Some(a + (b - a) * t);
            }
        }
    }

    // Leading gap backfills from the first valid value, trailing gap
    // forward-fills from the last.
    let first = valid[0];
    let last = valid[valid.len() - 1];
    for k in 0..first {
        values[k] = values[first];
    }
    for k in (last + 1)..values.len() {
        values[k] = values[last];
    }

    let mut seen = HashSet::new();
    let mut dates = Vec::with_capacity(values.len());
    let mut closes = Vec::with_capacity(values.len());
    for (date, value) in raw.dates.iter().zip(values.iter()) {
        if let Some(v) = value {
            if seen.insert(*date) {
                dates.push(*date);
                closes.push(*v);
            }
        }
    }

    if closes.len() < 2 {
        return None;
    }

    Some(PriceSeries {
        ticker: raw.ticker,
        dates,
        closes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::AdvisorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(ticker: &str, closes: Vec<f64>) -> PriceSeries {
        let dates = (1..=closes.len() as u32).map(date).collect();
        PriceSeries {
            ticker: ticker.into(),
            dates,
            closes,
        }
    }

    #[test]
    fn normalize_interpolates_interior_gaps() {
        let raw = series("A", vec![100.0, f64::NAN, f64::NAN, 130.0]);
        let out = normalize_series(raw).unwrap();
        assert_eq!(out.closes, vec![100.0, 110.0, 120.0, 130.0]);
    }

    #[test]
    fn normalize_fills_edges() {
        let raw = series("A", vec![f64::NAN, 100.0, 110.0, f64::NAN]);
        let out = normalize_series(raw).unwrap();
        assert_eq!(out.closes, vec![100.0, 100.0, 110.0, 110.0]);
    }

    #[test]
    fn normalize_rejects_thin_series() {
        assert!(normalize_series(series("A", vec![100.0])).is_none());
        assert!(normalize_series(series("A", vec![f64::NAN, 100.0, f64::INFINITY])).is_none());
        assert!(normalize_series(series("A", vec![])).is_none());
    }

    #[test]
    fn normalize_dedups_dates_keeping_first() {
        let raw = PriceSeries {
            ticker: "A".into(),
            dates: vec![date(1), date(1), date(2)],
            closes: vec![100.0, 999.0, 110.0],
        };
        let out = normalize_series(raw).unwrap();
        assert_eq!(out.dates, vec![date(1), date(2)]);
        assert_eq!(out.closes, vec![100.0, 110.0]);
    }

    /// Provider that fails a configurable number of times per ticker before
    /// succeeding, and counts every call.
    struct FlakyProvider {
        fail_first: usize,
        calls: AtomicUsize,
        rate_calls: AtomicUsize,
        rate: Result<Vec<f64>, ()>,
    }

    impl FlakyProvider {
        fn new(fail_first: usize) -> Self {
            Self {
                fail_first,
                calls: AtomicUsize::new(0),
                rate_calls: AtomicUsize::new(0),
                rate: Ok(vec![4.5, 4.7]),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for FlakyProvider {
        async fn fetch_series(
            &self,
            ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, AdvisorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(AdvisorError::Provider("transient".into()));
            }
            if ticker == "BAD" {
                return Ok(series(ticker, vec![f64::NAN; 5]));
            }
            Ok(series(ticker, vec![100.0, 101.0, 102.0, 103.0, 104.0]))
        }

        async fn fetch_risk_free_proxy(
            &self,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<f64>, AdvisorError> {
            self.rate_calls.fetch_add(1, Ordering::SeqCst);
            self.rate
                .clone()
                .map_err(|_| AdvisorError::Provider("rate source down".into()))
        }
    }

    fn gateway_with(provider: Arc<dyn MarketDataProvider>, dir: &std::path::Path) -> MarketDataGateway {
        MarketDataGateway::new(provider, SnapshotCache::new(dir))
    }

    #[tokio::test]
    async fn fetch_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new(2));
        let gateway = gateway_with(provider.clone(), dir.path());

        let outcome = gateway.fetch(&["SPY".to_string()], date(1), date(10)).await;
        assert_eq!(outcome.succeeded, vec!["SPY".to_string()]);
        assert!(outcome.failed.is_empty());
        assert!(!outcome.from_cache);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unusable_ticker_is_collected_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new(0));
        let gateway = gateway_with(provider, dir.path());

        let tickers = vec!["SPY".to_string(), "BAD".to_string()];
        let outcome = gateway.fetch(&tickers, date(1), date(10)).await;
        assert_eq!(outcome.succeeded, vec!["SPY".to_string()]);
        assert_eq!(outcome.failed, vec!["BAD".to_string()]);
    }

    #[tokio::test]
    async fn second_fetch_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new(0));
        let gateway = gateway_with(provider.clone(), dir.path());

        let tickers = vec!["SPY".to_string()];
        let first = gateway.fetch(&tickers, date(1), date(10)).await;
        assert!(!first.from_cache);
        let calls_after_first = provider.calls.load(Ordering::SeqCst);

        let second = gateway.fetch(&tickers, date(1), date(10)).await;
        assert!(second.from_cache);
        assert_eq!(second.succeeded, vec!["SPY".to_string()]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn cache_miss_when_request_not_covered() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FlakyProvider::new(0));
        let gateway = gateway_with(provider.clone(), dir.path());

        gateway.fetch(&["SPY".to_string()], date(1), date(10)).await;
        let calls = provider.calls.load(Ordering::SeqCst);

        // Request includes a ticker missing from the snapshot: must refetch.
        let outcome = gateway
            .fetch(&["SPY".to_string(), "QQQ".to_string()], date(1), date(10))
            .await;
        assert!(!outcome.from_cache);
        assert!(provider.calls.load(Ordering::SeqCst) > calls);
    }

    #[tokio::test]
    async fn risk_free_rate_averages_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();

        let provider = Arc::new(FlakyProvider::new(0));
        let gateway = gateway_with(provider, dir.path());
        let rate = gateway.fetch_risk_free_rate(date(1), date(10)).await;
        assert!((rate - 0.046).abs() < 1e-12);

        let mut down = FlakyProvider::new(0);
        down.rate = Err(());
        let gateway = gateway_with(Arc::new(down), dir.path());
        let rate = gateway.fetch_risk_free_rate(date(1), date(10)).await;
        assert_eq!(rate, DEFAULT_RISK_FREE_RATE);
    }
}
