use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lloyd's algorithm with k-means++ seeding. The RNG is seeded explicitly so
/// repeated runs over the same data produce identical partitions.
pub struct KMeans {
    pub k: usize,
    pub max_iter: usize,
    pub seed: u64,
}

pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: DMatrix<f64>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            max_iter: 100,
            seed,
        }
    }

    pub fn fit(&self, data: &DMatrix<f64>) -> KMeansFit {
        let n = data.nrows();
        let d = data.ncols();
        let k = self.k.clamp(1, n.max(1));

        let mut centroids = self.init_centroids(data, k);
        let mut labels = vec![0usize; n];

        for _ in 0..self.max_iter {
            let mut changed = false;
            for i in 0..n {
                let nearest = nearest_centroid(data, i, &centroids);
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            let mut sums = DMatrix::<f64>::zeros(k, d);
            let mut counts = vec![0usize; k];
            for i in 0..n {
                counts[labels[i]] += 1;
                for j in 0..d {
                    sums[(labels[i], j)] += data[(i, j)];
                }
            }

            for c in 0..k {
                if counts[c] > 0 {
                    for j in 0..d {
                        centroids[(c, j)] = sums[(c, j)] / counts[c] as f64;
                    }
                } else {
                    // Reseed an empty cluster at the point farthest from its
                    // current centroid (first such point on ties).
                    let mut far_idx = 0;
                    let mut far_dist = -1.0;
                    for i in 0..n {
                        let dist = row_sq_dist(data, i, &centroids, labels[i]);
                        if dist > far_dist {
                            far_dist = dist;
                            far_idx = i;
                        }
                    }
                    for j in 0..d {
                        centroids[(c, j)] = data[(far_idx, j)];
                    }
                    labels[far_idx] = c;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        let inertia = (0..n)
            .map(|i| row_sq_dist(data, i, &centroids, labels[i]))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
        }
    }

    /// k-means++: first centroid uniform, each next drawn proportionally to
    /// squared distance from the nearest chosen centroid.
    fn init_centroids(&self, data: &DMatrix<f64>, k: usize) -> DMatrix<f64> {
        let n = data.nrows();
        let d = data.ncols();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut chosen: Vec<usize> = vec![rng.gen_range(0..n)];
        while chosen.len() < k {
            let d2: Vec<f64> = (0..n)
                .map(|i| {
                    chosen
                        .iter()
                        .map(|&c| sq_dist(data, i, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = d2.iter().sum();

            let next = if total > 0.0 {
                let mut target = rng.gen_range(0.0..total);
                let mut pick = n - 1;
                for (i, w) in d2.iter().enumerate() {
                    if target < *w {
                        pick = i;
                        break;
                    }
                    target -= w;
                }
                pick
            } else {
                // All points coincide with a centroid; take the first index
                // not yet chosen.
                (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
            };
            chosen.push(next);
        }

        let mut centroids = DMatrix::<f64>::zeros(k, d);
        for (c, &i) in chosen.iter().enumerate() {
            for j in 0..d {
                centroids[(c, j)] = data[(i, j)];
            }
        }
        centroids
    }
}

fn sq_dist(data: &DMatrix<f64>, a: usize, b: usize) -> f64 {
    (0..data.ncols())
        .map(|j| {
            let diff = data[(a, j)] - data[(b, j)];
            diff * diff
        })
        .sum()
}

fn row_sq_dist(data: &DMatrix<f64>, i: usize, centroids: &DMatrix<f64>, c: usize) -> f64 {
    (0..data.ncols())
        .map(|j| {
            let diff = data[(i, j)] - centroids[(c, j)];
            diff * diff
        })
        .sum()
}

fn nearest_centroid(data: &DMatrix<f64>, i: usize, centroids: &DMatrix<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for c in 0..centroids.nrows() {
        let dist = row_sq_dist(data, i, centroids, c);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

/// Mean silhouette coefficient over all points; `None` unless at least two
/// distinct labels are present. Singleton clusters contribute 0.
pub fn silhouette_score(data: &DMatrix<f64>, labels: &[usize]) -> Option<f64> {
    let n = data.nrows();
    if n != labels.len() || n < 2 {
        return None;
    }

    let mut distinct: Vec<usize> = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 2 {
        return None;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];

        let mut same_sum = 0.0;
        let mut same_count = 0usize;
        // mean distance to every other cluster, keyed by label
        let mut other_sums: Vec<(usize, f64, usize)> =
            distinct.iter().map(|&l| (l, 0.0, 0usize)).collect();

        for j in 0..n {
            if i == j {
                continue;
            }
            let dist = sq_dist(data, i, j).sqrt();
            if labels[j] == own {
                same_sum += dist;
                same_count += 1;
            }
            for entry in other_sums.iter_mut() {
                if entry.0 == labels[j] && entry.0 != own {
                    entry.1 += dist;
                    entry.2 += 1;
                }
            }
        }

        if same_count == 0 {
            // Singleton cluster
            continue;
        }

        let a = same_sum / same_count as f64;
        let b = other_sums
            .iter()
            .filter(|(l, _, count)| *l != own && *count > 0)
            .map(|(_, sum, count)| sum / *count as f64)
            .fold(f64::INFINITY, f64::min);

        if !b.is_finite() {
            continue;
        }
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight blobs far apart.
    fn blobs() -> DMatrix<f64> {
        let rows: Vec<f64> = vec![
            0.0, 0.0, //
            0.1, 0.0, //
            0.0, 0.1, //
            10.0, 10.0, //
            10.1, 10.0, //
            10.0, 10.1, //
        ];
        DMatrix::from_row_slice(6, 2, &rows)
    }

    #[test]
    fn separates_blobs() {
        let data = blobs();
        let fit = KMeans::new(2, 42).fit(&data);

        assert!(fit.labels.iter().all(|&l| l < 2));
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[4], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 0.1);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let data = blobs();
        let a = KMeans::new(2, 42).fit(&data);
        let b = KMeans::new(2, 42).fit(&data);
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn inertia_decreases_with_k() {
        let data = blobs();
        let k1 = KMeans::new(1, 42).fit(&data);
        let k2 = KMeans::new(2, 42).fit(&data);
        assert!(k2.inertia < k1.inertia);
    }

    #[test]
    fn silhouette_prefers_true_split() {
        let data = blobs();
        let good = silhouette_score(&data, &[0, 0, 0, 1, 1, 1]).unwrap();
        let bad = silhouette_score(&data, &[0, 1, 0, 1, 0, 1]).unwrap();
        assert!(good > 0.9);
        assert!(good > bad);
    }

    #[test]
    fn silhouette_requires_two_clusters() {
        let data = blobs();
        assert!(silhouette_score(&data, &[0; 6]).is_none());
    }
}
