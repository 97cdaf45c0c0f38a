//! End-to-end scenarios over a deterministic in-memory provider.

use advisor_core::{AdvisorError, MarketDataProvider, PriceSeries, UserProfile};
use advisor_pipeline::{RecommendationPipeline, MIN_USABLE_INSTRUMENTS};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use market_data::{MarketDataGateway, SnapshotCache};
use recommender::PeerPreferences;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const HISTORY_DAYS: usize = 320;

fn universe() -> Vec<String> {
    [
        "SPY", "QQQ", "AGG", "TLT", "GLD", "EFA", "XLE", "VNQ", "069500", "102110", "114800",
        "133690",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Deterministic synthetic price paths: drift and oscillation amplitude vary
/// per instrument, so the metrics table has real spread for clustering.
struct SyntheticProvider {
    tickers: Vec<String>,
    series_calls: AtomicUsize,
}

impl SyntheticProvider {
    fn new(tickers: Vec<String>) -> Self {
        Self {
            tickers,
            series_calls: AtomicUsize::new(0),
        }
    }

    fn series_for(&self, ticker: &str) -> PriceSeries {
        let idx = self
            .tickers
            .iter()
            .position(|t| t == ticker)
            .unwrap_or(0);

        let drift = 0.0002 * (idx as f64 - 3.0);
        let amplitude = 0.004 + 0.003 * (idx % 5) as f64;
        let phase = idx as f64 * 0.7;

        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut price = 100.0 + idx as f64 * 10.0;
        let mut dates = Vec::with_capacity(HISTORY_DAYS);
        let mut closes = Vec::with_capacity(HISTORY_DAYS);
        for t in 0..HISTORY_DAYS {
            let daily = drift + amplitude * (0.37 * t as f64 + phase).sin();
            price *= daily.exp();
            dates.push(start + Duration::days(t as i64));
            closes.push(price);
        }

        PriceSeries {
            ticker: ticker.to_string(),
            dates,
            closes,
        }
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticProvider {
    async fn fetch_series(
        &self,
        ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<PriceSeries, AdvisorError> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.series_for(ticker))
    }

    async fn fetch_risk_free_proxy(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<f64>, AdvisorError> {
        Ok(vec![3.0])
    }
}

fn aggressive_profile() -> UserProfile {
    UserProfile {
        risk_tolerance: 5,
        investment_horizon: 5,
        goal: 5,
        market_preference: 3,
        experience: 3,
        loss_aversion: 1,
        theme_preference: 1,
    }
}

/// Peer dataset voting for the whole universe, so the candidate set always
/// covers more instruments than the requested top-N.
fn full_coverage_peers() -> PeerPreferences {
    let tickers = universe().join(", ");
    let csv = format!(
        "risk_tolerance,investment_horizon,goal,experience,loss_aversion,theme_preference,preferred_etfs\n\
         5,5,5,3,1,1,\"{tickers}\"\n\
         3,3,3,2,3,1,\"{tickers}\"\n"
    );
    PeerPreferences::from_reader(csv.as_bytes())
}

fn pipeline_with(
    provider: Arc<SyntheticProvider>,
    cache_dir: &std::path::Path,
    tickers: Vec<String>,
) -> RecommendationPipeline {
    let gateway = MarketDataGateway::new(provider, SnapshotCache::new(cache_dir));
    RecommendationPipeline::new(gateway)
        .with_universe(tickers)
        .with_peers(full_coverage_peers())
}

#[tokio::test]
async fn scenario_a_top_n_rows_sorted_by_score() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(SyntheticProvider::new(universe()));
    let pipeline = pipeline_with(provider, dir.path(), universe());

    let profile = aggressive_profile();
    let snapshot = pipeline.load_market_snapshot(&profile).await.unwrap();
    assert!(snapshot.metrics.len() >= 10);

    let top_n = 7;
    let recommendation = pipeline.recommend(&profile, &snapshot, top_n).unwrap();
    assert_eq!(recommendation.rows.len(), top_n);

    for pair in recommendation.rows.windows(2) {
        assert!(pair[0].recommendation_score >= pair[1].recommendation_score);
    }
}

#[tokio::test]
async fn scenario_b_identical_reruns_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(SyntheticProvider::new(universe()));
    let pipeline = pipeline_with(provider, dir.path(), universe());

    let profile = aggressive_profile();
    let snapshot = pipeline.load_market_snapshot(&profile).await.unwrap();

    let first = pipeline.recommend(&profile, &snapshot, 7).unwrap();
    let second = pipeline.recommend(&profile, &snapshot, 7).unwrap();

    let first_bytes = serde_json::to_string(&first.rows).unwrap();
    let second_bytes = serde_json::to_string(&second.rows).unwrap();
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first.cluster_explanation, second.cluster_explanation);
}

#[tokio::test]
async fn scenario_c_tiny_universe_fails_loudly() {
    let dir = tempfile::tempdir().unwrap();
    let tiny: Vec<String> = universe().into_iter().take(3).collect();
    assert!(tiny.len() < MIN_USABLE_INSTRUMENTS);

    let provider = Arc::new(SyntheticProvider::new(tiny.clone()));
    let pipeline = pipeline_with(provider, dir.path(), tiny);

    let result = pipeline.load_market_snapshot(&aggressive_profile()).await;
    assert!(matches!(result, Err(AdvisorError::InsufficientData(_))));
}

#[tokio::test]
async fn scenario_d_stale_snapshot_triggers_refetch() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(SyntheticProvider::new(universe()));
    let pipeline = pipeline_with(provider.clone(), dir.path(), universe());
    let profile = aggressive_profile();

    pipeline.load_market_snapshot(&profile).await.unwrap();
    let calls_after_first = provider.series_calls.load(Ordering::SeqCst);

    // A fresh snapshot is served from cache without touching the provider.
    pipeline.load_market_snapshot(&profile).await.unwrap();
    assert_eq!(provider.series_calls.load(Ordering::SeqCst), calls_after_first);

    // Age the stored snapshot past the expiry window.
    let cache = SnapshotCache::new(dir.path());
    let mut snapshot = cache.load().expect("fresh snapshot on disk");
    snapshot.download_time = Utc::now() - Duration::hours(market_data::CACHE_EXPIRY_HOURS + 1);
    cache.store(&snapshot).unwrap();
    assert!(cache.load().is_none(), "aged snapshot must be invalid");

    pipeline.load_market_snapshot(&profile).await.unwrap();
    assert!(
        provider.series_calls.load(Ordering::SeqCst) > calls_after_first,
        "stale cache must force a fresh download"
    );
}

#[tokio::test]
async fn market_preference_filters_output_market() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(SyntheticProvider::new(universe()));
    let pipeline = pipeline_with(provider, dir.path(), universe());

    let mut profile = aggressive_profile();
    profile.market_preference = 1; // domestic only
    let snapshot = pipeline.load_market_snapshot(&profile).await.unwrap();
    let recommendation = pipeline.recommend(&profile, &snapshot, 7).unwrap();

    assert!(!recommendation.rows.is_empty());
    for row in &recommendation.rows {
        assert_eq!(row.market, advisor_core::Market::Domestic);
    }
}

#[tokio::test]
async fn snapshot_labels_are_contiguous() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(SyntheticProvider::new(universe()));
    let pipeline = pipeline_with(provider, dir.path(), universe());

    let snapshot = pipeline
        .load_market_snapshot(&aggressive_profile())
        .await
        .unwrap();

    let ids = snapshot.metrics.cluster_ids();
    let max = snapshot
        .metrics
        .rows
        .iter()
        .map(|r| r.cluster)
        .max()
        .unwrap();
    assert_eq!(ids.iter().max().copied().unwrap(), max);
    // Labels form [0, k)
    for label in 0..=max {
        assert!(ids.contains(&label));
    }
}
