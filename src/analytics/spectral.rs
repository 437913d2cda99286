//! Spectral clustering of the simple projection.
//!
//! The normalized adjacency `D^-1/2 A D^-1/2` is diagonalized with
//! `nalgebra::SymmetricEigen`; nodes are embedded on the leading eigenvectors,
//! clustered with seeded k-means++, and `k` is picked by silhouette on the
//! distance `1 - A_ij`.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::config::CommunityConfig;
use crate::error::AlgorithmError;
use crate::graph::algorithms::renumber;
use crate::graph::SimpleGraph;

const ALGORITHM: &str = "spectral";
/// Implicit QR steps allowed per matrix row
const EIGEN_ITERATIONS_PER_ROW: usize = 100;

/// Cluster labels with the chosen `k` and its silhouette score.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralPartition {
    pub labels: Vec<usize>,
    pub k: usize,
    pub silhouette: f64,
}

pub fn spectral_clustering(
    simple: &SimpleGraph,
    config: &CommunityConfig,
) -> Result<SpectralPartition, AlgorithmError> {
    let n = simple.node_count();
    if n > config.spectral_max_nodes {
        return Err(AlgorithmError::TooLarge {
            algorithm: ALGORITHM.to_string(),
            size: n,
            limit: config.spectral_max_nodes,
        });
    }
    if n < 4 {
        return Err(AlgorithmError::degenerate(ALGORITHM, "fewer than 4 nodes"));
    }
    if simple.edge_count() == 0 {
        return Err(AlgorithmError::degenerate(ALGORITHM, "graph has no edges"));
    }

    let adjacency = dense_adjacency(simple);
    let (values, vectors) = eigen_decomposition(normalized_adjacency(&adjacency))?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

    let max_k = config.spectral_max_clusters.min(n / 2);
    let mut best: Option<SpectralPartition> = None;
    for k in 2..=max_k {
        let embedding: Vec<Vec<f64>> = (0..n)
            .map(|row| normalize_row(order[..k].iter().map(|&col| vectors[(row, col)]).collect()))
            .collect();
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(k as u64));
        let labels = renumber(&kmeans(&embedding, k, config.kmeans_max_iterations, &mut rng));
        if labels.iter().copied().max().unwrap_or(0) < 1 {
            continue;
        }
        let score = silhouette(&adjacency, &labels);
        debug!("Spectral k={} silhouette={:.4}", k, score);
        if best.as_ref().map_or(true, |b| score > b.silhouette) {
            best = Some(SpectralPartition {
                labels,
                k,
                silhouette: score,
            });
        }
    }

    best.ok_or_else(|| AlgorithmError::degenerate(ALGORITHM, "no k produced two clusters"))
}

fn dense_adjacency(simple: &SimpleGraph) -> DMatrix<f64> {
    let n = simple.node_count();
    let mut a = DMatrix::zeros(n, n);
    for (i, neighbors) in simple.adjacency.iter().enumerate() {
        for &j in neighbors {
            a[(i, j)] = 1.0;
        }
    }
    a
}

fn normalized_adjacency(a: &DMatrix<f64>) -> DMatrix<f64> {
    let inv_sqrt = DVector::from_iterator(
        a.nrows(),
        a.row_iter().map(|row| {
            let d = row.sum();
            if d > 0.0 {
                1.0 / d.sqrt()
            } else {
                0.0
            }
        }),
    );
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)] * inv_sqrt[i] * inv_sqrt[j])
}

/// Eigenvalues and the matrix whose columns are the matching eigenvectors.
fn eigen_decomposition(m: DMatrix<f64>) -> Result<(Vec<f64>, DMatrix<f64>), AlgorithmError> {
    let max_iterations = EIGEN_ITERATIONS_PER_ROW * m.nrows().max(1);
    let eigen = SymmetricEigen::try_new(m, f64::EPSILON, max_iterations)
        .ok_or_else(|| AlgorithmError::not_converged("symmetric_eigen", max_iterations))?;
    Ok((eigen.eigenvalues.iter().copied().collect(), eigen.eigenvectors))
}

fn normalize_row(mut row: Vec<f64>) -> Vec<f64> {
    let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in row.iter_mut() {
            *x /= norm;
        }
    }
    row
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centers: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, center) in centers.iter().enumerate() {
        let d = squared_distance(point, center);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

/// Lloyd's k-means with k-means++ seeding.
fn kmeans<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    rng: &mut R,
) -> Vec<usize> {
    let n = points.len();
    let mut centers: Vec<Vec<f64>> = vec![points[rng.gen_range(0..n)].clone()];
    while centers.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| {
                centers
                    .iter()
                    .map(|c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };
        centers.push(points[next].clone());
    }

    let mut labels: Vec<usize> = points.iter().map(|p| nearest(p, &centers)).collect();
    for _ in 0..max_iterations {
        let dim = points[0].len();
        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            counts[label] += 1;
            for (s, x) in sums[label].iter_mut().zip(p) {
                *s += x;
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                centers[c] = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            }
        }

        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centers)).collect();
        if next == labels {
            break;
        }
        labels = next;
    }
    labels
}

/// Mean silhouette with distance `1 - A_ij` (0 on the diagonal).
/// Members of singleton clusters score 0.
fn silhouette(adjacency: &DMatrix<f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    let clusters = labels.iter().copied().max().map_or(0, |c| c + 1);
    if n == 0 || clusters < 2 {
        return 0.0;
    }
    let mut sizes = vec![0usize; clusters];
    for &l in labels {
        sizes[l] += 1;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if sizes[own] < 2 {
            continue;
        }
        let mut sums = vec![0.0; clusters];
        for j in 0..n {
            if j != i {
                sums[labels[j]] += 1.0 - adjacency[(i, j)];
            }
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..clusters)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 && b.is_finite() {
            total += (b - a) / denom;
        }
    }
    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, Entity, EntityType, Relation, RelationType};

    fn simple_from_pairs(n: usize, pairs: &[(usize, usize)]) -> SimpleGraph {
        let nodes = (0..n)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Actor, &[]))
            .collect();
        let edges = pairs
            .iter()
            .map(|&(a, b)| {
                Relation::new(&format!("n{}", a), &format!("n{}", b), RelationType::Competition, 1.0)
            })
            .collect();
        build_graph(nodes, edges).to_simple()
    }

    #[test]
    fn test_eigen_decomposition_of_symmetric_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let (mut values, _) = eigen_decomposition(m).unwrap();
        values.sort_by(|a, b| a.total_cmp(b));
        assert!((values[0] - 1.0).abs() < 1e-9);
        assert!((values[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_eigenvectors_satisfy_definition() {
        let m = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.5, 1.0, 3.0, 0.0, 0.5, 0.0, 1.0]);
        let (values, vectors) = eigen_decomposition(m.clone()).unwrap();
        for col in 0..3 {
            let v = vectors.column(col).clone_owned();
            let residual = &m * &v - &v * values[col];
            assert!(residual.norm() < 1e-8);
        }
    }

    #[test]
    fn test_normalized_adjacency_of_path() {
        let simple = simple_from_pairs(3, &[(0, 1), (1, 2)]);
        let normalized = normalized_adjacency(&dense_adjacency(&simple));
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((normalized[(0, 1)] - expected).abs() < 1e-12);
        assert!((normalized[(1, 2)] - expected).abs() < 1e-12);
        assert_eq!(normalized[(0, 2)], 0.0);
    }

    #[test]
    fn test_two_cliques_split_in_two() {
        let mut pairs = Vec::new();
        for offset in [0, 4] {
            for i in 0..4 {
                for j in (i + 1)..4 {
                    pairs.push((offset + i, offset + j));
                }
            }
        }
        pairs.push((0, 4));
        let simple = simple_from_pairs(8, &pairs);
        let partition = spectral_clustering(&simple, &CommunityConfig::default()).unwrap();
        assert_eq!(partition.k, 2);
        let first = partition.labels[1];
        assert!(partition.labels[1..4].iter().all(|&l| l == first));
        assert!(partition.labels[5..8].iter().all(|&l| l != first));
        assert!(partition.silhouette > 0.0);
    }

    #[test]
    fn test_rejects_small_and_large_graphs() {
        let tiny = simple_from_pairs(3, &[(0, 1), (1, 2)]);
        assert!(matches!(
            spectral_clustering(&tiny, &CommunityConfig::default()),
            Err(AlgorithmError::Degenerate { .. })
        ));

        let config = CommunityConfig {
            spectral_max_nodes: 4,
            ..CommunityConfig::default()
        };
        let chain = simple_from_pairs(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]);
        assert!(matches!(
            spectral_clustering(&chain, &config),
            Err(AlgorithmError::TooLarge { size: 6, .. })
        ));
    }

    #[test]
    fn test_silhouette_perfect_split() {
        // Two disjoint triangles, labelled by triangle
        let simple = simple_from_pairs(6, &[(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5)]);
        let a = dense_adjacency(&simple);
        let score = silhouette(&a, &[0, 0, 0, 1, 1, 1]);
        assert!((score - 1.0).abs() < 1e-12);
    }
}
