//! Baseline graph generators for small-world comparisons.
//!
//! Both generators return sorted adjacency lists, the same shape as
//! [`SimpleGraph::adjacency`](super::models::SimpleGraph).

use rand::Rng;

/// Erdős–Rényi G(n, p) sample.
pub fn erdos_renyi<R: Rng + ?Sized>(n: usize, p: f64, rng: &mut R) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    let p = p.clamp(0.0, 1.0);
    for i in 0..n {
        for j in (i + 1)..n {
            if rng.gen::<f64>() < p {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    for neighbors in adjacency.iter_mut() {
        neighbors.sort_unstable();
    }
    adjacency
}

/// Ring lattice where every node links to its `k / 2` nearest neighbors on
/// each side (a Watts–Strogatz graph with rewiring probability 0).
///
/// `k` is rounded down to an even number and capped at `n - 1`.
pub fn ring_lattice(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    if n < 2 {
        return adjacency;
    }
    let half = (k.min(n - 1) / 2).max(1);
    for i in 0..n {
        for offset in 1..=half {
            let j = (i + offset) % n;
            if j != i && !adjacency[i].contains(&j) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    for neighbors in adjacency.iter_mut() {
        neighbors.sort_unstable();
    }
    adjacency
}
