use advisor_core::{AdvisorError, Market, MarketDataProvider, PriceSeries};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// 13-week T-bill yield, quoted in percent.
const RISK_FREE_SYMBOL: &str = "%5EIRX";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let oldest = *ts.front().expect("non-empty queue");
            let sleep_dur =
                self.window.saturating_sub(now.duration_since(oldest)) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "Rate limiter: waiting {:.1}s for chart API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteBlock>,
    adjclose: Option<Vec<AdjCloseBlock>>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    adjclose: Option<Vec<Option<f64>>>,
}

/// HTTP provider over the public Yahoo chart endpoint.
#[derive(Clone)]
pub struct YahooChartProvider {
    client: Client,
    rate_limiter: RateLimiter,
}

impl YahooChartProvider {
    /// Builds the HTTP client. Failing to construct it means the required
    /// data-access capability is missing, which is fatal at startup.
    pub fn new() -> Result<Self, AdvisorError> {
        let rate_limit: usize = std::env::var("MARKET_DATA_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120)
            .max(1);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; etf-advisor/0.1)")
            .build()
            .map_err(|e| AdvisorError::Provider(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        })
    }

    /// Korean codes trade on KRX; the chart endpoint wants a `.KS` suffix.
    fn chart_symbol(ticker: &str) -> String {
        match Market::from_ticker(ticker) {
            Market::Domestic => format!("{ticker}.KS"),
            Market::Foreign => ticker.to_string(),
        }
    }

    fn epoch_seconds(date: NaiveDate) -> i64 {
        date.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Vec<NaiveDate>, Vec<f64>), AdvisorError> {
        self.rate_limiter.acquire().await;

        let url = format!("{CHART_BASE_URL}/{symbol}");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", Self::epoch_seconds(start).to_string()),
                ("period2", Self::epoch_seconds(end).to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AdvisorError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AdvisorError::Provider(format!(
                "HTTP {} for {}",
                response.status(),
                symbol
            )));
        }

        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Provider(e.to_string()))?;

        if let Some(err) = chart.chart.error {
            if !err.is_null() {
                return Err(AdvisorError::Provider(format!("{symbol}: {err}")));
            }
        }

        let result = chart
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| AdvisorError::Provider(format!("{symbol}: empty chart result")))?;

        let timestamps = result
            .timestamp
            .ok_or_else(|| AdvisorError::Provider(format!("{symbol}: no timestamps")))?;

        // Prefer adjusted closes, fall back to raw closes; neither present
        // means the response is unusable.
        let closes = result
            .indicators
            .adjclose
            .and_then(|mut blocks| {
                if blocks.is_empty() {
                    None
                } else {
                    blocks.remove(0).adjclose
                }
            })
            .or_else(|| {
                result
                    .indicators
                    .quote
                    .into_iter()
                    .next()
                    .and_then(|q| q.close)
            })
            .ok_or_else(|| AdvisorError::Provider(format!("{symbol}: no close column")))?;

        let mut dates = Vec::with_capacity(timestamps.len());
        let mut values = Vec::with_capacity(timestamps.len());
        for (ts, close) in timestamps.iter().zip(closes.iter()) {
            let date = DateTime::from_timestamp(*ts, 0)
                .ok_or_else(|| AdvisorError::Provider(format!("{symbol}: bad timestamp {ts}")))?
                .date_naive();
            dates.push(date);
            // Nulls become NaN; the gateway treats non-finite as missing.
            values.push(close.unwrap_or(f64::NAN));
        }

        Ok((dates, values))
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartProvider {
    async fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, AdvisorError> {
        let symbol = Self::chart_symbol(ticker);
        let (dates, closes) = self.fetch_chart(&symbol, start, end).await?;
        Ok(PriceSeries {
            ticker: ticker.to_string(),
            dates,
            closes,
        })
    }

    async fn fetch_risk_free_proxy(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<f64>, AdvisorError> {
        let (_, closes) = self.fetch_chart(RISK_FREE_SYMBOL, start, end).await?;
        Ok(closes.into_iter().filter(|v| v.is_finite()).collect())
    }
}
