//! Per-instrument risk statistics derived from log-return series.
//!
//! `compute_metrics` is a pure function of the return table and the
//! risk-free rate; every output is finite, with degenerate computations
//! substituting 0 rather than propagating NaN/Inf.

use advisor_core::{InstrumentMetrics, Market, MetricsTable, PriceTable, ReturnSeries, ReturnTable};
use rayon::prelude::*;
use statrs::statistics::Statistics;

/// Trading days per year.
pub const ANNUAL_FACTOR: f64 = 252.0;

/// Round-trip transaction cost subtracted from annualized return.
const COST_DOMESTIC: f64 = 0.0015;
const COST_FOREIGN: f64 = 0.0030;

const VOL_EPS: f64 = 1e-6;
const LOSS_EPS: f64 = 1e-9;

/// Daily log returns for every series in the table. Entries where either
/// price is non-positive become NaN and are treated as missing downstream.
pub fn log_returns(prices: &PriceTable) -> ReturnTable {
    let series = prices
        .series
        .iter()
        .filter(|s| s.len() >= 2)
        .map(|s| {
            let values = s
                .closes
                .windows(2)
                .map(|w| {
                    if w[0] > 0.0 && w[1] > 0.0 {
                        (w[1] / w[0]).ln()
                    } else {
                        f64::NAN
                    }
                })
                .collect();
            ReturnSeries {
                ticker: s.ticker.clone(),
                dates: s.dates[1..].to_vec(),
                values,
            }
        })
        .collect();
    ReturnTable { series }
}

/// Full metrics row per instrument. Cluster labels default to 0 and are
/// assigned by the clustering engine afterwards.
pub fn compute_metrics(returns: &ReturnTable, risk_free_rate: f64) -> MetricsTable {
    let rows = returns
        .series
        .par_iter()
        .map(|series| compute_row(series, risk_free_rate))
        .collect();
    MetricsTable { rows }
}

fn compute_row(series: &ReturnSeries, risk_free_rate: f64) -> InstrumentMetrics {
    let market = Market::from_ticker(&series.ticker);
    let values: Vec<f64> = series
        .values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if values.len() < 2 {
        return degenerate_row(&series.ticker, market);
    }

    let n = values.len();
    let cost = match market {
        Market::Domestic => COST_DOMESTIC,
        Market::Foreign => COST_FOREIGN,
    };

    let mean = values.as_slice().mean();
    let annual_return = mean * ANNUAL_FACTOR - cost;
    let annual_volatility = values.as_slice().std_dev() * ANNUAL_FACTOR.sqrt();

    let sharpe = if annual_volatility > VOL_EPS {
        (annual_return - risk_free_rate) / annual_volatility
    } else {
        0.0
    };

    // Drawdown over the cumulative return path.
    let mut cumulative = 1.0;
    let mut peak = f64::MIN;
    let mut max_drawdown = 0.0f64;
    let mut squared_dd_sum = 0.0;
    for r in &values {
        cumulative *= 1.0 + r;
        if cumulative > peak {
            peak = cumulative;
        }
        let drawdown = cumulative / peak - 1.0;
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
        }
        squared_dd_sum += drawdown * drawdown;
    }
    let ulcer_index = (squared_dd_sum / n as f64).sqrt();

    let daily_rf = risk_free_rate / ANNUAL_FACTOR;

    // Returns at or above the daily threshold contribute 0, matching the
    // masked-series definition of downside deviation.
    let masked: Vec<f64> = values
        .iter()
        .map(|&r| if r < daily_rf { r } else { 0.0 })
        .collect();
    let downside_risk = masked.as_slice().std_dev() * ANNUAL_FACTOR.sqrt();
    let sortino = if downside_risk > VOL_EPS {
        (annual_return - risk_free_rate) / downside_risk
    } else {
        0.0
    };

    let gain = values
        .iter()
        .map(|&r| (r - daily_rf).max(0.0))
        .sum::<f64>()
        / n as f64;
    let loss = values
        .iter()
        .map(|&r| (daily_rf - r).max(0.0))
        .sum::<f64>()
        / n as f64;
    let omega = if loss > LOSS_EPS { gain / loss } else { 0.0 };

    let calmar = if max_drawdown.abs() > VOL_EPS {
        annual_return / -max_drawdown
    } else {
        0.0
    };

    let skewness = sample_skewness(&values);
    let kurtosis = sample_excess_kurtosis(&values);

    // Trailing one-year window; shorter histories leave these at 0.
    let (recent_return, recent_volatility) = if n >= ANNUAL_FACTOR as usize {
        let recent = &values[n - ANNUAL_FACTOR as usize..];
        (
            recent.mean() * ANNUAL_FACTOR,
            recent.std_dev() * ANNUAL_FACTOR.sqrt(),
        )
    } else {
        (0.0, 0.0)
    };

    InstrumentMetrics {
        ticker: series.ticker.clone(),
        market,
        annual_return: finite_or_zero(annual_return),
        annual_volatility: finite_or_zero(annual_volatility),
        sharpe: finite_or_zero(sharpe),
        sortino: finite_or_zero(sortino),
        calmar: finite_or_zero(calmar),
        omega: finite_or_zero(omega),
        max_drawdown: finite_or_zero(max_drawdown),
        ulcer_index: finite_or_zero(ulcer_index),
        downside_risk: finite_or_zero(downside_risk),
        skewness: finite_or_zero(skewness),
        kurtosis: finite_or_zero(kurtosis),
        recent_return: finite_or_zero(recent_return),
        recent_volatility: finite_or_zero(recent_volatility),
        cluster: 0,
    }
}

fn degenerate_row(ticker: &str, market: Market) -> InstrumentMetrics {
    InstrumentMetrics {
        ticker: ticker.to_string(),
        market,
        annual_return: 0.0,
        annual_volatility: 0.0,
        sharpe: 0.0,
        sortino: 0.0,
        calmar: 0.0,
        omega: 0.0,
        max_drawdown: 0.0,
        ulcer_index: 0.0,
        downside_risk: 0.0,
        skewness: 0.0,
        kurtosis: 0.0,
        recent_return: 0.0,
        recent_volatility: 0.0,
        cluster: 0,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Bias-corrected sample skewness (the adjusted Fisher-Pearson estimate).
fn sample_skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;
    if m2 <= 0.0 {
        return 0.0;
    }
    let g1 = m3 / m2.powf(1.5);
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// Bias-corrected sample excess kurtosis.
fn sample_excess_kurtosis(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 4 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let m4 = values.iter().map(|v| (v - mean).powi(4)).sum::<f64>() / nf;
    if m2 <= 0.0 {
        return 0.0;
    }
    let g2 = m4 / (m2 * m2) - 3.0;
    ((nf + 1.0) * g2 + 6.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0))
}
