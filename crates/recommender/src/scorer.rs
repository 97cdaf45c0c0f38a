use advisor_core::{universe, AdvisorError, Market, MetricsTable, RankedEtf, UserProfile};

use crate::profile;

pub const DEFAULT_TOP_N: usize = 7;

const WEIGHT_EPS: f64 = 1e-12;
const SPREAD_EPS: f64 = 1e-12;

/// Weights over the four normalized scoring signals. Always sums to 1 after
/// construction.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    /// Risk-adjusted return (Sortino ratio).
    pub sortino: f64,
    /// Drawdown safety (negated max drawdown).
    pub safety: f64,
    /// Calmness (inverted volatility).
    pub calm: f64,
    /// Theme match indicator.
    pub theme: f64,
}

impl ScoreWeights {
    pub fn from_profile(user: &UserProfile) -> Self {
        let sortino = user.risk_tolerance as f64 / 5.0 * 0.5 + 0.3;
        let safety = user.loss_aversion as f64 / 5.0;
        let calm = (6.0 - user.risk_tolerance as f64) / 5.0;
        let theme = if user.theme_preference != 1 { 0.2 } else { 0.0 };

        let total = sortino + safety + calm + theme;
        if total > WEIGHT_EPS {
            Self {
                sortino: sortino / total,
                safety: safety / total,
                calm: calm / total,
                theme: theme / total,
            }
        } else {
            Self {
                sortino: 0.4,
                safety: 0.3,
                calm: 0.2,
                theme: 0.1,
            }
        }
    }

    pub fn sum(&self) -> f64 {
        self.sortino + self.safety + self.calm + self.theme
    }
}

/// Merges cluster and collaborative candidates, applies the market hard
/// filter, scores the survivors and returns the top `top_n` rows.
///
/// Every stage that can empty the candidate set fails explicitly rather than
/// returning a silently truncated result.
pub fn recommend(
    user: &UserProfile,
    metrics: &MetricsTable,
    cluster_tickers: &[String],
    cf_tickers: &[String],
    top_n: usize,
) -> Result<Vec<RankedEtf>, AdvisorError> {
    // Cluster candidates first, collaborative additions after, deduplicated
    // and restricted to instruments we hold metrics for.
    let mut candidates: Vec<&str> = Vec::new();
    for ticker in cluster_tickers.iter().chain(cf_tickers.iter()) {
        if metrics.contains(ticker) && !candidates.contains(&ticker.as_str()) {
            candidates.push(ticker);
        }
    }

    if candidates.is_empty() {
        return Err(AdvisorError::NoMatchingInstruments(
            "no recommended instruments overlap the current metrics table; \
             try relaxing your preferences"
                .into(),
        ));
    }

    // Market preference is a hard constraint.
    let required_market = match user.market_preference {
        1 => Some(Market::Domestic),
        2 => Some(Market::Foreign),
        _ => None,
    };
    if let Some(market) = required_market {
        candidates.retain(|tk| metrics.get(tk).map(|m| m.market) == Some(market));
        if candidates.is_empty() {
            return Err(AdvisorError::NoMatchingInstruments(format!(
                "no instruments match the {} market preference; \
                 try relaxing the market constraint",
                market.code()
            )));
        }
    }

    let rows: Vec<_> = candidates
        .iter()
        .filter_map(|tk| metrics.get(tk))
        .collect();

    let preferred = profile::preferred_theme(user.theme_preference);
    let theme_match: Vec<f64> = rows
        .iter()
        .map(|m| match preferred {
            Some(theme) if universe::theme_of(&m.ticker) == Some(theme) => 1.0,
            _ => 0.0,
        })
        .collect();

    let sortino_norm = min_max_scale(&rows.iter().map(|m| m.sortino).collect::<Vec<_>>());
    let neg_drawdown_norm =
        min_max_scale(&rows.iter().map(|m| -m.max_drawdown).collect::<Vec<_>>());
    let inv_volatility_norm: Vec<f64> =
        min_max_scale(&rows.iter().map(|m| m.annual_volatility).collect::<Vec<_>>())
            .into_iter()
            .map(|v| 1.0 - v)
            .collect();

    let weights = ScoreWeights::from_profile(user);

    let mut scored: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let score = weights.sortino * sortino_norm[i]
                + weights.safety * neg_drawdown_norm[i]
                + weights.calm * inv_volatility_norm[i]
                + weights.theme * theme_match[i];
            (i, score)
        })
        .collect();

    // Stable sort: equal scores keep candidate order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let ranked = scored
        .into_iter()
        .take(top_n)
        .map(|(i, score)| {
            let m = rows[i];
            let (aum, expense_ratio) = placeholder_figures(&m.ticker);
            RankedEtf {
                ticker: m.ticker.clone(),
                name: universe::display_name(&m.ticker),
                category: universe::category_of(&m.ticker).to_string(),
                market: m.market,
                return_1y: m.annual_return * 100.0,
                volatility: m.annual_volatility * 100.0,
                sharpe_ratio: m.sharpe,
                max_drawdown: m.max_drawdown * 100.0,
                sortino_ratio: m.sortino,
                calmar_ratio: m.calmar,
                omega_ratio: m.omega,
                aum,
                expense_ratio,
                recommendation_score: score,
            }
        })
        .collect();

    Ok(ranked)
}

/// Min-max normalization onto [0, 1]; a constant column maps to all zeros.
fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_finite() || (max - min).abs() < SPREAD_EPS {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Deterministic placeholder fund-size and cost figures derived from the
/// ticker, so identical inputs produce byte-identical output tables.
fn placeholder_figures(ticker: &str) -> (f64, f64) {
    let aum_unit = hash_unit(ticker.as_bytes());
    let expense_unit = hash_unit(format!("{ticker}:expense").as_bytes());
    (1_000.0 + aum_unit * 49_000.0, 0.05 + expense_unit * 0.70)
}

/// FNV-1a hash folded into [0, 1).
fn hash_unit(bytes: &[u8]) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash >> 11) as f64 / (1u64 << 53) as f64
}
