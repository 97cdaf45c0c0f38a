use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AdvisorError;
use crate::types::PriceSeries;

/// Capability interface over an external market-data source. Any conforming
/// provider may be substituted for the default HTTP client.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily close series for one instrument over [start, end].
    async fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, AdvisorError>;

    /// Risk-free-rate proxy observations over [start, end], in percent.
    async fn fetch_risk_free_proxy(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<f64>, AdvisorError>;
}
