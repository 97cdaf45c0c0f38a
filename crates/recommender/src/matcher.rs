use advisor_core::{AdvisorError, MetricsTable, UserProfile};

use crate::profile;

/// Target volatility per unit of risk score, mapping 1..=5 onto ~0.05..0.25.
const VOL_PER_RISK_POINT: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct ClusterMatch {
    pub cluster_id: usize,
    pub tickers: Vec<String>,
    pub explanation: String,
}

/// Finds the cluster whose (return, volatility) centroid is nearest the
/// user's target point. Ties keep the first-encountered cluster.
pub fn match_cluster(
    user: &UserProfile,
    metrics: &MetricsTable,
) -> Result<ClusterMatch, AdvisorError> {
    if metrics.is_empty() {
        return Err(AdvisorError::InsufficientData(
            "cannot match a cluster on an empty metrics table".into(),
        ));
    }

    let targets = profile::translate(user);
    let target_vol = targets.risk_score * VOL_PER_RISK_POINT;
    let target_ret = targets.expected_return;

    let mut best: Option<(usize, f64, f64, f64)> = None; // (id, dist, c_ret, c_vol)
    for cluster_id in metrics.cluster_ids() {
        let members: Vec<_> = metrics
            .rows
            .iter()
            .filter(|r| r.cluster == cluster_id)
            .collect();
        let count = members.len() as f64;
        let mean_ret = members.iter().map(|r| r.annual_return).sum::<f64>() / count;
        let mean_vol = members.iter().map(|r| r.annual_volatility).sum::<f64>() / count;

        let dist = ((mean_ret - target_ret).powi(2) + (mean_vol - target_vol).powi(2)).sqrt();
        let improves = best.map_or(true, |(_, d, _, _)| dist < d);
        if improves {
            best = Some((cluster_id, dist, mean_ret, mean_vol));
        }
    }

    let Some((cluster_id, _, centroid_ret, centroid_vol)) = best else {
        return Err(AdvisorError::InsufficientData(
            "no cluster centroids could be computed".into(),
        ));
    };

    let tickers: Vec<String> = metrics
        .rows
        .iter()
        .filter(|r| r.cluster == cluster_id)
        .map(|r| r.ticker.clone())
        .collect();

    let explanation = format!(
        "Matched cluster {cluster_id}: preferred volatility {:.1}% and target return {:.1}% \
         are closest to its centroid (mean volatility {:.1}%, mean return {:.1}%).",
        target_vol * 100.0,
        target_ret * 100.0,
        centroid_vol * 100.0,
        centroid_ret * 100.0,
    );

    tracing::info!("{explanation}");

    Ok(ClusterMatch {
        cluster_id,
        tickers,
        explanation,
    })
}
