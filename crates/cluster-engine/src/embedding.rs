use nalgebra::{DMatrix, SymmetricEigen};

const EMBED_ITERS: usize = 30;
const LEARNING_RATE: f64 = 0.1;

/// Low-dimensional embedding: a principal-component projection refined by a
/// neighborhood-contraction pass. Each refinement step pulls a point toward
/// the centroid of its nearest neighbors (neighborhoods taken in the original
/// feature space), then enforces `min_dist` as a separation floor, so local
/// structure tightens while distinct groups stay apart. Fully deterministic.
pub struct NeighborhoodEmbedding {
    pub n_components: usize,
    pub n_neighbors: usize,
    pub min_dist: f64,
}

impl NeighborhoodEmbedding {
    pub fn fit_transform(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let n = data.nrows();
        let c = self.n_components.min(data.ncols()).max(1);
        if n == 0 || data.ncols() == 0 {
            return DMatrix::zeros(n, c);
        }

        let mut embedding = pca_project(data, c);
        if n < 3 {
            return embedding;
        }

        let k = self.n_neighbors.clamp(1, n - 1);
        let neighbors = nearest_neighbors(data, k);

        for _ in 0..EMBED_ITERS {
            // Attraction toward the local neighborhood centroid.
            let mut next = embedding.clone();
            for i in 0..n {
                for j in 0..c {
                    let centroid: f64 = neighbors[i]
                        .iter()
                        .map(|&nb| embedding[(nb, j)])
                        .sum::<f64>()
                        / k as f64;
                    next[(i, j)] += LEARNING_RATE * (centroid - embedding[(i, j)]);
                }
            }

            // Separation floor between every pair of points.
            if self.min_dist > 0.0 {
                for a in 0..n {
                    for b in (a + 1)..n {
                        let mut dist_sq = 0.0;
                        for j in 0..c {
                            let diff = next[(a, j)] - next[(b, j)];
                            dist_sq += diff * diff;
                        }
                        let dist = dist_sq.sqrt();
                        if dist > 0.0 && dist < self.min_dist {
                            let push = 0.5 * LEARNING_RATE * (self.min_dist - dist) / dist;
                            for j in 0..c {
                                let diff = next[(a, j)] - next[(b, j)];
                                next[(a, j)] += push * diff;
                                next[(b, j)] -= push * diff;
                            }
                        }
                    }
                }
            }

            embedding = next;
        }

        embedding
    }
}

/// Projection onto the top `c` principal components of the column-centered
/// data.
fn pca_project(data: &DMatrix<f64>, c: usize) -> DMatrix<f64> {
    let n = data.nrows();
    let d = data.ncols();

    let mut centered = data.clone();
    for j in 0..d {
        let mean = data.column(j).iter().sum::<f64>() / n as f64;
        for i in 0..n {
            centered[(i, j)] -= mean;
        }
    }

    let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
    let covariance = centered.transpose() * &centered / denom;
    let eigen = SymmetricEigen::new(covariance);

    // Eigenpairs ordered by descending eigenvalue.
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let components = DMatrix::from_fn(d, c, |row, col| eigen.eigenvectors[(row, order[col])]);
    centered * components
}

/// Indices of the `k` nearest rows for every row, by Euclidean distance,
/// ties broken by index order.
fn nearest_neighbors(data: &DMatrix<f64>, k: usize) -> Vec<Vec<usize>> {
    let n = data.nrows();
    (0..n)
        .map(|i| {
            let mut dists: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let mut sum = 0.0;
                    for col in 0..data.ncols() {
                        let diff = data[(i, col)] - data[(j, col)];
                        sum += diff * diff;
                    }
                    (sum, j)
                })
                .collect();
            dists.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            dists.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}
