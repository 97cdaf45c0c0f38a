use nalgebra::DMatrix;

const IQR_EPS: f64 = 1e-12;

/// Median/IQR column scaler. Centering and spread are quantile-based, so a
/// handful of outlier instruments cannot dominate the feature space.
pub struct RobustScaler {
    centers: Vec<f64>,
    scales: Vec<f64>,
}

impl RobustScaler {
    pub fn fit(data: &DMatrix<f64>) -> Self {
        let mut centers = Vec::with_capacity(data.ncols());
        let mut scales = Vec::with_capacity(data.ncols());

        for j in 0..data.ncols() {
            let mut column: Vec<f64> = data.column(j).iter().copied().collect();
            column.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let median = percentile(&column, 0.50);
            let iqr = percentile(&column, 0.75) - percentile(&column, 0.25);

            centers.push(median);
            // Constant columns are centered but not rescaled.
            scales.push(if iqr.abs() > IQR_EPS { iqr } else { 1.0 });
        }

        Self { centers, scales }
    }

    pub fn transform(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(data.nrows(), data.ncols(), |i, j| {
            (data[(i, j)] - self.centers[j]) / self.scales[j]
        })
    }

    pub fn fit_transform(data: &DMatrix<f64>) -> DMatrix<f64> {
        Self::fit(data).transform(data)
    }
}

/// Quantile of a sorted slice with linear interpolation between order
/// statistics.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
