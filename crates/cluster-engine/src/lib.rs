//! Unsupervised partitioning of the instrument universe: robust scaling,
//! low-dimensional embedding with a silhouette-scored hyperparameter search,
//! and k-means with elbow-selected cluster count.

pub mod elbow;
pub mod embedding;
pub mod kmeans;
pub mod scaler;

pub use elbow::find_elbow;
pub use embedding::NeighborhoodEmbedding;
pub use kmeans::{silhouette_score, KMeans, KMeansFit};
pub use scaler::RobustScaler;

use advisor_core::MetricsTable;
use nalgebra::DMatrix;

/// Below this many instruments the universe is left as a single cluster.
pub const MIN_CLUSTER_ROWS: usize = 5;

const EMBED_COMPONENTS: usize = 3;
const NEIGHBOR_GRID: [usize; 3] = [5, 10, 15];
const MIN_DIST_GRID: [f64; 3] = [0.0, 0.1, 0.2];
const FALLBACK_NEIGHBORS: usize = 15;
const FALLBACK_MIN_DIST: f64 = 0.1;
const DEFAULT_K: usize = 3;

#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    pub embedding: DMatrix<f64>,
    /// One label per metrics row, contiguous from 0.
    pub labels: Vec<usize>,
}

pub struct ClusterEngine {
    pub seed: u64,
    pub max_k: usize,
}

impl Default for ClusterEngine {
    fn default() -> Self {
        Self {
            seed: 42,
            max_k: 10,
        }
    }
}

impl ClusterEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Recomputed in full whenever the metrics table changes; labels are
    /// stable only within one run.
    pub fn cluster(&self, metrics: &MetricsTable) -> ClusterOutcome {
        let features = feature_matrix(metrics);
        let n = features.nrows();

        if n < MIN_CLUSTER_ROWS {
            tracing::info!("Only {n} instruments, keeping a single cluster");
            return ClusterOutcome {
                embedding: DMatrix::zeros(n, EMBED_COMPONENTS.min(features.ncols())),
                labels: vec![0; n],
            };
        }

        let scaled = RobustScaler::fit_transform(&features);
        let embedding = self.best_embedding(&scaled);
        let k = self.select_k(&embedding);

        let labels = if k < 2 {
            vec![0; n]
        } else {
            relabel_contiguous(KMeans::new(k, self.seed).fit(&embedding).labels)
        };

        tracing::info!("Clustered {n} instruments into {} groups", distinct(&labels));
        ClusterOutcome { embedding, labels }
    }

    /// Tries every (neighbors, min_dist) combination, scoring each embedding
    /// by the silhouette of a provisional partition; the best one is kept.
    fn best_embedding(&self, scaled: &DMatrix<f64>) -> DMatrix<f64> {
        let n = scaled.nrows();
        let trial_k = DEFAULT_K.min((n - 1).max(2));
        let mut best: Option<(f64, DMatrix<f64>)> = None;

        if trial_k >= 2 {
            for &neighbors in &NEIGHBOR_GRID {
                let neighbors = neighbors.min(n - 1).max(1);
                for &min_dist in &MIN_DIST_GRID {
                    let candidate = NeighborhoodEmbedding {
                        n_components: EMBED_COMPONENTS,
                        n_neighbors: neighbors,
                        min_dist,
                    }
                    .fit_transform(scaled);

                    let trial = KMeans::new(trial_k, self.seed).fit(&candidate);
                    if distinct(&trial.labels) < 2 {
                        continue;
                    }
                    if let Some(score) = silhouette_score(&candidate, &trial.labels) {
                        if !score.is_finite() {
                            continue;
                        }
                        let improves = best.as_ref().map_or(true, |(b, _)| score > *b);
                        if improves {
                            tracing::debug!(
                                "Embedding candidate neighbors={neighbors} min_dist={min_dist}: silhouette {score:.3}"
                            );
                            best = Some((score, candidate));
                        }
                    }
                }
            }
        }

        match best {
            Some((_, embedding)) => embedding,
            None => {
                tracing::debug!("No multi-cluster embedding candidate; using fallback parameters");
                NeighborhoodEmbedding {
                    n_components: EMBED_COMPONENTS,
                    n_neighbors: FALLBACK_NEIGHBORS.min(n - 1).max(1),
                    min_dist: FALLBACK_MIN_DIST,
                }
                .fit_transform(scaled)
            }
        }
    }

    /// Cluster count by the elbow of the WCSS curve over [2, min(max_k, n-1)].
    fn select_k(&self, embedding: &DMatrix<f64>) -> usize {
        let n = embedding.nrows();
        let upper = self.max_k.min(n.saturating_sub(1));

        let mut ks = Vec::new();
        let mut wcss = Vec::new();
        for k in 2..=upper {
            let fit = KMeans::new(k, self.seed).fit(embedding);
            ks.push(k);
            wcss.push(fit.inertia);
        }

        let mut k = DEFAULT_K;
        if wcss.len() >= 2 {
            if let Some(found) = find_elbow(&ks, &wcss) {
                k = found;
            }
        }
        k.min(n.saturating_sub(1))
    }
}

/// Feature matrix over the ten clustering columns, non-finite entries zeroed.
fn feature_matrix(metrics: &MetricsTable) -> DMatrix<f64> {
    let n = metrics.len();
    let columns = 10;
    DMatrix::from_fn(n, columns, |i, j| {
        let row = &metrics.rows[i];
        let value = match j {
            0 => row.annual_return,
            1 => row.annual_volatility,
            2 => row.sharpe,
            3 => row.max_drawdown,
            4 => row.sortino,
            5 => row.calmar,
            6 => row.skewness,
            7 => row.kurtosis,
            8 => row.ulcer_index,
            _ => row.omega,
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    })
}

fn distinct(labels: &[usize]) -> usize {
    let mut seen: Vec<usize> = labels.to_vec();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Remap labels to first-encountered order starting at 0.
fn relabel_contiguous(labels: Vec<usize>) -> Vec<usize> {
    let mut mapping: Vec<usize> = Vec::new();
    labels
        .into_iter()
        .map(|label| {
            if let Some(pos) = mapping.iter().position(|&m| m == label) {
                pos
            } else {
                mapping.push(label);
                mapping.len() - 1
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{InstrumentMetrics, Market};

    fn metrics_row(ticker: &str, annual_return: f64, volatility: f64) -> InstrumentMetrics {
        InstrumentMetrics {
            ticker: ticker.into(),
            market: Market::Foreign,
            annual_return,
            annual_volatility: volatility,
            sharpe: annual_return / volatility.max(0.01),
            sortino: annual_return / volatility.max(0.01),
            calmar: 0.5,
            omega: 1.1,
            max_drawdown: -volatility,
            ulcer_index: volatility / 2.0,
            downside_risk: volatility / 2.0,
            skewness: 0.0,
            kurtosis: 0.0,
            recent_return: annual_return,
            recent_volatility: volatility,
            cluster: 0,
        }
    }

    /// Two obviously different populations: low-vol bond-like rows and
    /// high-vol equity-like rows.
    fn bimodal_table(per_group: usize) -> MetricsTable {
        let mut rows = Vec::new();
        for i in 0..per_group {
            let jitter = i as f64 * 0.001;
            rows.push(metrics_row(&format!("BOND{i}"), 0.02 + jitter, 0.05 + jitter));
            rows.push(metrics_row(&format!("EQ{i}"), 0.15 + jitter, 0.35 + jitter));
        }
        MetricsTable { rows }
    }

    #[test]
    fn degenerate_universe_is_single_cluster() {
        let table = bimodal_table(2); // 4 rows < MIN_CLUSTER_ROWS
        let outcome = ClusterEngine::default().cluster(&table);
        assert_eq!(outcome.labels, vec![0; 4]);
    }

    #[test]
    fn labels_are_contiguous_and_bounded() {
        let table = bimodal_table(8);
        let outcome = ClusterEngine::default().cluster(&table);

        assert_eq!(outcome.labels.len(), table.len());
        let k = distinct(&outcome.labels);
        assert!(k >= 1);
        assert!(outcome.labels.iter().all(|&l| l < k));
        // First row always carries label 0 after contiguous relabeling.
        assert_eq!(outcome.labels[0], 0);
    }

    #[test]
    fn deterministic_across_runs() {
        let table = bimodal_table(8);
        let engine = ClusterEngine::default();
        let a = engine.cluster(&table);
        let b = engine.cluster(&table);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.embedding, b.embedding);
    }

    #[test]
    fn relabel_maps_first_seen_to_zero() {
        assert_eq!(relabel_contiguous(vec![2, 2, 0, 1, 0]), vec![0, 0, 1, 2, 1]);
        assert_eq!(relabel_contiguous(vec![]), Vec::<usize>::new());
    }

    #[test]
    fn embedding_has_at_most_three_components() {
        let table = bimodal_table(8);
        let outcome = ClusterEngine::default().cluster(&table);
        assert!(outcome.embedding.ncols() <= 3);
        assert_eq!(outcome.embedding.nrows(), table.len());
    }
}
