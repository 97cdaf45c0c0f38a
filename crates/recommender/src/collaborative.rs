use advisor_core::{MetricsTable, UserProfile};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// How many similar historical users contribute votes.
pub const TOP_SIMILAR_PEERS: usize = 5;

const REQUIRED_COLUMNS: [&str; 7] = [
    "risk_tolerance",
    "investment_horizon",
    "goal",
    "experience",
    "loss_aversion",
    "theme_preference",
    "preferred_etfs",
];

#[derive(Debug, Clone)]
struct PeerRow {
    answers: [f64; 6],
    preferred_etfs: String,
}

/// Auxiliary dataset of historical users and the instruments they favored.
/// Absence or malformation degrades to an empty dataset, never an error.
#[derive(Debug, Clone, Default)]
pub struct PeerPreferences {
    rows: Vec<PeerRow>,
}

impl PeerPreferences {
    pub fn from_csv_path(path: impl AsRef<Path>) -> Self {
        match std::fs::File::open(path.as_ref()) {
            Ok(file) => Self::from_reader(file),
            Err(e) => {
                tracing::info!(
                    "Peer preference dataset {:?} unavailable ({e}); collaborative filter disabled",
                    path.as_ref()
                );
                Self::default()
            }
        }
    }

    pub fn from_reader(reader: impl Read) -> Self {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = match csv_reader.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => {
                tracing::warn!("Peer preference dataset has no readable header: {e}");
                return Self::default();
            }
        };

        let mut indices = Vec::with_capacity(REQUIRED_COLUMNS.len());
        for column in REQUIRED_COLUMNS {
            match headers.iter().position(|h| h.trim() == column) {
                Some(idx) => indices.push(idx),
                None => {
                    tracing::warn!("Peer preference dataset missing column '{column}'");
                    return Self::default();
                }
            }
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(_) => continue,
            };

            let mut answers = [0.0f64; 6];
            let mut valid = true;
            for (slot, &idx) in indices[..6].iter().enumerate() {
                match record.get(idx).and_then(|v| v.trim().parse::<f64>().ok()) {
                    Some(value) if value.is_finite() => answers[slot] = value,
                    _ => {
                        valid = false;
                        break;
                    }
                }
            }
            if !valid {
                continue;
            }

            let preferred_etfs = record
                .get(indices[6])
                .map(|v| v.trim().to_string())
                .unwrap_or_default();

            rows.push(PeerRow {
                answers,
                preferred_etfs,
            });
        }

        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Instruments favored by the most similar historical users, ordered by
/// similarity-weighted vote. Only tickers present in the metrics table count.
pub fn recommend(
    user: &UserProfile,
    metrics: &MetricsTable,
    peers: &PeerPreferences,
    top_similar: usize,
) -> Vec<String> {
    if peers.is_empty() {
        return Vec::new();
    }

    let user_vector = [
        user.risk_tolerance as f64,
        user.investment_horizon as f64,
        user.goal as f64,
        user.experience as f64,
        user.loss_aversion as f64,
        user.theme_preference as f64,
    ];

    // (similarity, row index), most similar first; ties keep row order.
    let mut ranked: Vec<(f64, usize)> = peers
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (cosine_similarity(&user_vector, &row.answers), idx))
        .collect();
    ranked.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut votes: HashMap<String, f64> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for &(similarity, idx) in ranked.iter().take(top_similar.min(ranked.len())) {
        let row = &peers.rows[idx];
        for ticker in row.preferred_etfs.split(',') {
            let ticker = ticker.trim();
            if ticker.is_empty() || !metrics.contains(ticker) {
                continue;
            }
            if !votes.contains_key(ticker) {
                order.push(ticker.to_string());
            }
            *votes.entry(ticker.to_string()).or_insert(0.0) += similarity;
        }
    }

    // Descending vote; stable sort keeps first-voted order on ties.
    order.sort_by(|a, b| {
        votes[b]
            .partial_cmp(&votes[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

fn cosine_similarity(a: &[f64; 6], b: &[f64; 6]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
