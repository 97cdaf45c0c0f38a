use advisor_core::{AdvisorError, MetricsTable, ReturnTable};

/// Constraint thresholds for complement selection. The defaults mirror the
/// hand-tuned production values but are plain configuration, not law.
#[derive(Debug, Clone, Copy)]
pub struct ComplementPolicy {
    /// Tier-1 cap on |correlation| with the core holding.
    pub max_abs_correlation: f64,
    /// Floor on the Sortino-adjacent quality gate (Sharpe ratio) in every tier.
    pub min_sharpe: f64,
}

impl Default for ComplementPolicy {
    fn default() -> Self {
        Self {
            max_abs_correlation: 0.5,
            min_sharpe: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComplementPick {
    pub ticker: String,
    pub correlation: f64,
}

#[derive(Debug, Clone)]
pub struct ComplementResult {
    pub picks: Vec<ComplementPick>,
    /// 1-based index of the constraint tier that produced the result.
    pub tier: usize,
}

/// Diversification candidates for a core holding, ranked by ascending
/// |correlation| with it.
///
/// An ordered list of constraint tiers is tried until one yields a non-empty
/// result: tier 1 requires both the correlation cap and the quality floor,
/// tier 2 drops the correlation cap. Exhausting every tier is a hard failure.
pub fn select_complements(
    core: &str,
    metrics: &MetricsTable,
    returns: &ReturnTable,
    policy: &ComplementPolicy,
    limit: usize,
) -> Result<ComplementResult, AdvisorError> {
    if !metrics.contains(core) {
        return Err(AdvisorError::NoMatchingInstruments(format!(
            "core instrument {core} is not in the metrics table"
        )));
    }

    // (ticker, correlation, sharpe) for every candidate with a computable
    // correlation to the core series.
    let candidates: Vec<(String, f64, f64)> = metrics
        .rows
        .iter()
        .filter(|r| r.ticker != core)
        .filter_map(|r| {
            returns
                .correlation(core, &r.ticker)
                .map(|corr| (r.ticker.clone(), corr, r.sharpe))
        })
        .collect();

    let tiers: [(usize, bool); 2] = [(1, true), (2, false)];
    for (tier, enforce_correlation_cap) in tiers {
        let mut picks: Vec<ComplementPick> = candidates
            .iter()
            .filter(|(_, corr, sharpe)| {
                *sharpe > policy.min_sharpe
                    && (!enforce_correlation_cap || corr.abs() <= policy.max_abs_correlation)
            })
            .map(|(ticker, corr, _)| ComplementPick {
                ticker: ticker.clone(),
                correlation: *corr,
            })
            .collect();

        if picks.is_empty() {
            continue;
        }

        picks.sort_by(|a, b| {
            a.correlation
                .abs()
                .partial_cmp(&b.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        picks.truncate(limit);

        if tier > 1 {
            tracing::info!(
                "Complement selection for {core} relaxed to tier {tier} (correlation cap dropped)"
            );
        } else {
            tracing::info!("Complement selection for {core} satisfied tier 1 constraints");
        }

        return Ok(ComplementResult { picks, tier });
    }

    Err(AdvisorError::NoMatchingInstruments(format!(
        "no complement for {core} passes any constraint tier; relax the quality floor"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{InstrumentMetrics, Market, ReturnSeries};
    use chrono::NaiveDate;

    fn row(ticker: &str, sharpe: f64) -> InstrumentMetrics {
        InstrumentMetrics {
            ticker: ticker.into(),
            market: Market::Foreign,
            annual_return: 0.05,
            annual_volatility: 0.1,
            sharpe,
            sortino: 0.5,
            calmar: 0.5,
            omega: 1.1,
            max_drawdown: -0.1,
            ulcer_index: 0.05,
            downside_risk: 0.05,
            skewness: 0.0,
            kurtosis: 0.0,
            recent_return: 0.05,
            recent_volatility: 0.1,
            cluster: 0,
        }
    }

    fn series(ticker: &str, values: Vec<f64>) -> ReturnSeries {
        let dates = (0..values.len() as u32)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect();
        ReturnSeries {
            ticker: ticker.into(),
            dates,
            values,
        }
    }

    fn fixture() -> (MetricsTable, ReturnTable) {
        let core = vec![0.01, -0.02, 0.03, -0.01, 0.02, 0.01];
        // MIRROR moves with the core, HEDGE moves independently.
        let mirror = core.clone();
        let hedge = vec![0.01, 0.01, -0.01, -0.01, 0.01, -0.01];

        let metrics = MetricsTable {
            rows: vec![row("CORE", 1.0), row("MIRROR", 1.2), row("HEDGE", 0.8)],
        };
        let returns = ReturnTable {
            series: vec![
                series("CORE", core),
                series("MIRROR", mirror),
                series("HEDGE", hedge),
            ],
        };
        (metrics, returns)
    }

    #[test]
    fn tier_one_picks_low_correlation_candidates() {
        let (metrics, returns) = fixture();
        let result =
            select_complements("CORE", &metrics, &returns, &ComplementPolicy::default(), 5)
                .unwrap();
        assert_eq!(result.tier, 1);
        assert_eq!(result.picks.len(), 1);
        assert_eq!(result.picks[0].ticker, "HEDGE");
    }

    #[test]
    fn relaxes_to_tier_two_when_everything_correlates() {
        let (metrics, returns) = fixture();
        let strict = ComplementPolicy {
            max_abs_correlation: 0.000001,
            min_sharpe: 0.0,
        };
        let result = select_complements("CORE", &metrics, &returns, &strict, 5).unwrap();
        assert_eq!(result.tier, 2);
        assert!(!result.picks.is_empty());
        // Still ranked by ascending |correlation|.
        assert_eq!(result.picks[0].ticker, "HEDGE");
    }

    #[test]
    fn exhausted_tiers_fail_hard() {
        let (metrics, returns) = fixture();
        let impossible = ComplementPolicy {
            max_abs_correlation: 0.5,
            min_sharpe: 10.0,
        };
        let result = select_complements("CORE", &metrics, &returns, &impossible, 5);
        assert!(matches!(
            result,
            Err(AdvisorError::NoMatchingInstruments(_))
        ));
    }

    #[test]
    fn unknown_core_is_an_error() {
        let (metrics, returns) = fixture();
        let result =
            select_complements("NOPE", &metrics, &returns, &ComplementPolicy::default(), 5);
        assert!(result.is_err());
    }
}
