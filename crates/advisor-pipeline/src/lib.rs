//! End-to-end recommendation pipeline: fetch -> returns -> metrics ->
//! cluster, materialized as an immutable `MarketSnapshot`, then
//! match + collaborative filter + score against that snapshot.
//!
//! The snapshot is an explicit value passed by reference between stages;
//! callers decide when to recompute it, and nothing here mutates shared
//! process state.

use advisor_core::{universe, AdvisorError, MetricsTable, RankedEtf, ReturnTable, UserProfile};
use chrono::{DateTime, Months, Utc};
use cluster_engine::ClusterEngine;
use market_data::MarketDataGateway;
use nalgebra::DMatrix;
use recommender::{collaborative, matcher, scorer, PeerPreferences, TOP_SIMILAR_PEERS};

/// Hard floor on the number of usable instruments for one data-load cycle.
pub const MIN_USABLE_INSTRUMENTS: usize = 5;

/// Immutable result of one data-load cycle. Regenerating it is the only way
/// to change it.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub metrics: MetricsTable,
    pub returns: ReturnTable,
    pub embedding: DMatrix<f64>,
    pub risk_free_rate: f64,
    pub fetched_at: DateTime<Utc>,
    pub failed_tickers: Vec<String>,
}

/// Ranked output for one profile against one snapshot.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub rows: Vec<RankedEtf>,
    pub matched_cluster: usize,
    pub cluster_explanation: String,
}

pub struct RecommendationPipeline {
    gateway: MarketDataGateway,
    cluster_engine: ClusterEngine,
    universe: Vec<String>,
    peers: PeerPreferences,
}

impl RecommendationPipeline {
    pub fn new(gateway: MarketDataGateway) -> Self {
        Self {
            gateway,
            cluster_engine: ClusterEngine::default(),
            universe: universe::default_universe(),
            peers: PeerPreferences::default(),
        }
    }

    /// Replace the default instrument universe.
    pub fn with_universe(mut self, tickers: Vec<String>) -> Self {
        self.universe = tickers;
        self
    }

    /// Attach a peer preference dataset for the collaborative filter.
    pub fn with_peers(mut self, peers: PeerPreferences) -> Self {
        self.peers = peers;
        self
    }

    /// Blocking fetch -> returns -> metrics -> cluster sequence.
    ///
    /// Fails hard when the surviving instrument set falls below
    /// `MIN_USABLE_INSTRUMENTS` at either the fetch or the return-derivation
    /// stage.
    pub async fn load_market_snapshot(
        &self,
        profile: &UserProfile,
    ) -> Result<MarketSnapshot, AdvisorError> {
        profile.validate()?;

        let years = lookback_years(profile.investment_horizon);
        let end = Utc::now().date_naive();
        let start = end
            .checked_sub_months(Months::new(12 * years))
            .unwrap_or(end);

        tracing::info!(
            "Loading {} instruments over {} years of history",
            self.universe.len(),
            years
        );

        let outcome = self.gateway.fetch(&self.universe, start, end).await;
        if outcome.succeeded.len() < MIN_USABLE_INSTRUMENTS {
            return Err(AdvisorError::InsufficientData(format!(
                "only {} of {} instruments produced usable series (minimum {})",
                outcome.succeeded.len(),
                self.universe.len(),
                MIN_USABLE_INSTRUMENTS
            )));
        }

        let returns = risk_metrics::log_returns(&outcome.prices);
        if returns.len() < MIN_USABLE_INSTRUMENTS {
            return Err(AdvisorError::InsufficientData(format!(
                "only {} instruments have enough history for return series (minimum {})",
                returns.len(),
                MIN_USABLE_INSTRUMENTS
            )));
        }

        let risk_free_rate = self.gateway.fetch_risk_free_rate(start, end).await;
        tracing::info!("Risk-free rate for the window: {risk_free_rate:.4}");

        let mut metrics = risk_metrics::compute_metrics(&returns, risk_free_rate);
        let clustering = self.cluster_engine.cluster(&metrics);
        metrics.assign_clusters(&clustering.labels);

        Ok(MarketSnapshot {
            metrics,
            returns,
            embedding: clustering.embedding,
            risk_free_rate,
            fetched_at: Utc::now(),
            failed_tickers: outcome.failed,
        })
    }

    /// Derives the ranked table for `profile` from an existing snapshot.
    /// Pure with respect to the snapshot; two calls with identical inputs
    /// produce identical output.
    pub fn recommend(
        &self,
        profile: &UserProfile,
        snapshot: &MarketSnapshot,
        top_n: usize,
    ) -> Result<Recommendation, AdvisorError> {
        profile.validate()?;

        let matched = matcher::match_cluster(profile, &snapshot.metrics)?;
        let cf_picks =
            collaborative::recommend(profile, &snapshot.metrics, &self.peers, TOP_SIMILAR_PEERS);
        tracing::info!(
            "Cluster {} contributes {} candidates, collaborative filter {}",
            matched.cluster_id,
            matched.tickers.len(),
            cf_picks.len()
        );

        let rows = scorer::recommend(profile, &snapshot.metrics, &matched.tickers, &cf_picks, top_n)?;

        Ok(Recommendation {
            rows,
            matched_cluster: matched.cluster_id,
            cluster_explanation: matched.explanation,
        })
    }
}

/// Data-collection window by investment horizon code.
fn lookback_years(horizon: u8) -> u32 {
    match horizon {
        1 => 1,
        2 => 3,
        3 => 5,
        4 | 5 => 10,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_mapping() {
        assert_eq!(lookback_years(1), 1);
        assert_eq!(lookback_years(2), 3);
        assert_eq!(lookback_years(3), 5);
        assert_eq!(lookback_years(4), 10);
        assert_eq!(lookback_years(5), 10);
        assert_eq!(lookback_years(9), 5);
    }
}
