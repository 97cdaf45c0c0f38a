use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AdvisorError;

/// Market an instrument trades on, inferred from identifier shape:
/// Korean ETF codes are six digits, everything else is treated as US.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    Domestic,
    Foreign,
}

impl Market {
    pub fn from_ticker(ticker: &str) -> Self {
        if ticker.len() == 6 && ticker.chars().all(|c| c.is_ascii_digit()) {
            Market::Domestic
        } else {
            Market::Foreign
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Market::Domestic => "KR",
            Market::Foreign => "US",
        }
    }
}

/// Static instrument category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theme {
    Technology,
    Energy,
    Healthcare,
    Finance,
    Consumer,
    Industrials,
    Utilities,
    Communications,
    Materials,
    RealEstate,
    BroadMarket,
    Bonds,
    Commodities,
    International,
}

impl Theme {
    pub fn label(&self) -> &'static str {
        match self {
            Theme::Technology => "Technology",
            Theme::Energy => "Energy",
            Theme::Healthcare => "Healthcare",
            Theme::Finance => "Finance",
            Theme::Consumer => "Consumer",
            Theme::Industrials => "Industrials",
            Theme::Utilities => "Utilities",
            Theme::Communications => "Communications",
            Theme::Materials => "Materials",
            Theme::RealEstate => "Real Estate",
            Theme::BroadMarket => "Broad Market",
            Theme::Bonds => "Bonds",
            Theme::Commodities => "Commodities",
            Theme::International => "International",
        }
    }
}

/// Daily close series for one instrument. One value per trading day,
/// dates strictly ascending after gateway normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// Ordered collection of price series keyed by ticker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceTable {
    pub series: Vec<PriceSeries>,
}

impl PriceTable {
    pub fn get(&self, ticker: &str) -> Option<&PriceSeries> {
        self.series.iter().find(|s| s.ticker == ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.get(ticker).is_some()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.series.iter().map(|s| s.ticker.clone()).collect()
    }

    pub fn push(&mut self, series: PriceSeries) {
        self.series.push(series);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Columns for the requested tickers, preserving request order.
    /// Tickers absent from the table are skipped.
    pub fn select(&self, tickers: &[String]) -> PriceTable {
        PriceTable {
            series: tickers
                .iter()
                .filter_map(|tk| self.get(tk).cloned())
                .collect(),
        }
    }
}

/// Log-return series derived from a price series; one fewer observation
/// than the prices it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnSeries {
    pub ticker: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReturnTable {
    pub series: Vec<ReturnSeries>,
}

impl ReturnTable {
    pub fn get(&self, ticker: &str) -> Option<&ReturnSeries> {
        self.series.iter().find(|s| s.ticker == ticker)
    }

    pub fn tickers(&self) -> Vec<String> {
        self.series.iter().map(|s| s.ticker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Pearson correlation between two return series over their common dates.
    /// `None` when either series is missing or fewer than 2 dates overlap.
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        let sa = self.get(a)?;
        let sb = self.get(b)?;

        let by_date: HashMap<NaiveDate, f64> = sb
            .dates
            .iter()
            .zip(sb.values.iter())
            .map(|(d, v)| (*d, *v))
            .collect();

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (d, v) in sa.dates.iter().zip(sa.values.iter()) {
            if let Some(w) = by_date.get(d) {
                if v.is_finite() && w.is_finite() {
                    xs.push(*v);
                    ys.push(*w);
                }
            }
        }

        let n = xs.len();
        if n < 2 {
            return None;
        }

        let mean_x = xs.iter().sum::<f64>() / n as f64;
        let mean_y = ys.iter().sum::<f64>() / n as f64;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for i in 0..n {
            let dx = xs[i] - mean_x;
            let dy = ys[i] - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }

        if var_x <= 0.0 || var_y <= 0.0 {
            return None;
        }
        Some(cov / (var_x.sqrt() * var_y.sqrt()))
    }
}

/// Per-instrument risk statistics for one data-load cycle. Every field is
/// finite; degenerate computations substitute 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentMetrics {
    pub ticker: String,
    pub market: Market,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub omega: f64,
    pub max_drawdown: f64,
    pub ulcer_index: f64,
    pub downside_risk: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub recent_return: f64,
    pub recent_volatility: f64,
    pub cluster: usize,
}

/// Metrics rows in a stable order (the order instruments survived the fetch).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsTable {
    pub rows: Vec<InstrumentMetrics>,
}

impl MetricsTable {
    pub fn get(&self, ticker: &str) -> Option<&InstrumentMetrics> {
        self.rows.iter().find(|r| r.ticker == ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.get(ticker).is_some()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.ticker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Overwrite cluster labels, row-aligned with the table order.
    pub fn assign_clusters(&mut self, labels: &[usize]) {
        for (row, label) in self.rows.iter_mut().zip(labels.iter()) {
            row.cluster = *label;
        }
    }

    /// Distinct cluster ids in first-encountered order.
    pub fn cluster_ids(&self) -> Vec<usize> {
        let mut ids = Vec::new();
        for row in &self.rows {
            if !ids.contains(&row.cluster) {
                ids.push(row.cluster);
            }
        }
        ids
    }
}

/// Questionnaire answers. Immutable once validated; every field is a small
/// integer code (see `validate` for ranges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub risk_tolerance: u8,
    pub investment_horizon: u8,
    pub goal: u8,
    pub market_preference: u8,
    pub experience: u8,
    pub loss_aversion: u8,
    pub theme_preference: u8,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), AdvisorError> {
        let checks: [(&str, u8, u8, u8); 7] = [
            ("risk_tolerance", self.risk_tolerance, 1, 5),
            ("investment_horizon", self.investment_horizon, 1, 5),
            ("goal", self.goal, 1, 5),
            ("market_preference", self.market_preference, 1, 3),
            ("experience", self.experience, 1, 3),
            ("loss_aversion", self.loss_aversion, 1, 5),
            ("theme_preference", self.theme_preference, 1, 4),
        ];
        for (name, value, lo, hi) in checks {
            if value < lo || value > hi {
                return Err(AdvisorError::InvalidProfile(format!(
                    "{name} must be in [{lo}, {hi}], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One row of the ranked recommendation table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEtf {
    pub ticker: String,
    pub name: String,
    pub category: String,
    pub market: Market,
    /// Annualized return, percent.
    pub return_1y: f64,
    /// Annualized volatility, percent.
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Percent, <= 0.
    pub max_drawdown: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub omega_ratio: f64,
    /// Placeholder assets-under-management figure (millions).
    pub aum: f64,
    /// Placeholder expense ratio, percent.
    pub expense_ratio: f64,
    pub recommendation_score: f64,
}
