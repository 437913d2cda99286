//! Graph algorithm primitives.
//!
//! Shared building blocks used by the analyzers:
//! - **BFS distances / connected components** — on the simple projection,
//!   optionally with a removal mask (attack simulations)
//! - **Clustering** — local coefficients, average clustering, transitivity
//! - **Betweenness centrality** — via `rustworkx_core::centrality::betweenness_centrality`
//! - **Closeness / degree centrality** — BFS-based
//! - **PageRank** — strength-weighted power iteration on the directed multigraph
//! - **Community detection (Louvain)** — custom local-moving implementation
//! - **Modularity / global efficiency**
//!
//! Results are indexed by node position (`NodeIndex::index()`), which is the
//! same for a [`ConflictGraph`] and its [`SimpleGraph`] projection.

use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};

use super::models::{ConflictGraph, SimpleGraph};
use crate::error::AlgorithmError;

// ============================================================================
// BFS & components
// ============================================================================

/// Hop distances from `source` to every node (`None` = unreachable or removed).
pub fn bfs_distances(
    adjacency: &[Vec<usize>],
    source: usize,
    removed: Option<&[bool]>,
) -> Vec<Option<usize>> {
    let n = adjacency.len();
    let is_removed = |i: usize| removed.is_some_and(|r| r[i]);
    let mut dist: Vec<Option<usize>> = vec![None; n];
    if is_removed(source) {
        return dist;
    }

    let mut queue = VecDeque::new();
    dist[source] = Some(0);
    queue.push_back(source);
    while let Some(current) = queue.pop_front() {
        let d = dist[current].unwrap_or(0);
        for &neighbor in &adjacency[current] {
            if dist[neighbor].is_none() && !is_removed(neighbor) {
                dist[neighbor] = Some(d + 1);
                queue.push_back(neighbor);
            }
        }
    }
    dist
}

/// Connected components of the non-removed nodes, largest first.
///
/// Members within a component are sorted; ties in size keep discovery order.
pub fn connected_components(adjacency: &[Vec<usize>], removed: Option<&[bool]>) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let is_removed = |i: usize| removed.is_some_and(|r| r[i]);
    let mut seen = vec![false; n];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if seen[start] || is_removed(start) {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::new();
        seen[start] = true;
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            members.push(current);
            for &neighbor in &adjacency[current] {
                if !seen[neighbor] && !is_removed(neighbor) {
                    seen[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    components.sort_by_key(|c| std::cmp::Reverse(c.len()));
    components
}

/// Induced adjacency restricted to `members` (positions remapped to 0..k).
pub fn induced_adjacency(adjacency: &[Vec<usize>], members: &[usize]) -> Vec<Vec<usize>> {
    let position: HashMap<usize, usize> = members
        .iter()
        .enumerate()
        .map(|(i, &node)| (node, i))
        .collect();
    members
        .iter()
        .map(|&node| {
            adjacency[node]
                .iter()
                .filter_map(|nb| position.get(nb).copied())
                .collect()
        })
        .collect()
}

// ============================================================================
// Clustering
// ============================================================================

/// Number of edges among the neighbors of `node`.
fn neighbor_links(adjacency: &[Vec<usize>], node: usize) -> usize {
    let neighbors = &adjacency[node];
    let mut links = 0usize;
    for (i, &a) in neighbors.iter().enumerate() {
        for &b in &neighbors[i + 1..] {
            if adjacency[a].binary_search(&b).is_ok() {
                links += 1;
            }
        }
    }
    links
}

/// Local clustering coefficient per node (0 for degree < 2).
///
/// Neighbor lists must be sorted, as [`SimpleGraph::adjacency`] guarantees.
pub fn local_clustering(adjacency: &[Vec<usize>]) -> Vec<f64> {
    (0..adjacency.len())
        .map(|node| {
            let k = adjacency[node].len();
            if k < 2 {
                return 0.0;
            }
            let possible = k * (k - 1) / 2;
            neighbor_links(adjacency, node) as f64 / possible as f64
        })
        .collect()
}

/// Mean of the local clustering coefficients (0 for an empty graph).
pub fn average_clustering(adjacency: &[Vec<usize>]) -> f64 {
    if adjacency.is_empty() {
        return 0.0;
    }
    local_clustering(adjacency).iter().sum::<f64>() / adjacency.len() as f64
}

/// Transitivity: `3 × triangles / connected triples`.
pub fn transitivity(adjacency: &[Vec<usize>]) -> f64 {
    let mut closed = 0usize;
    let mut triples = 0usize;
    for node in 0..adjacency.len() {
        let k = adjacency[node].len();
        if k < 2 {
            continue;
        }
        triples += k * (k - 1) / 2;
        closed += neighbor_links(adjacency, node);
    }
    if triples == 0 {
        return 0.0;
    }
    // Each triangle is seen once from each of its three corners.
    closed as f64 / triples as f64
}

// ============================================================================
// Centralities on the simple projection
// ============================================================================

/// Degree centrality `deg / (n - 1)`.
pub fn degree_centrality(simple: &SimpleGraph) -> Vec<f64> {
    let n = simple.node_count();
    if n < 2 {
        return vec![0.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    (0..n).map(|i| simple.degree(i) as f64 * scale).collect()
}

/// Normalized betweenness centrality via rustworkx-core.
pub fn betweenness_centrality(simple: &SimpleGraph) -> Vec<f64> {
    let g = &simple.graph;
    if g.node_count() == 0 {
        return Vec::new();
    }

    let scores = rustworkx_core::centrality::betweenness_centrality(
        g, false, // include_endpoints
        true,  // normalized
        200,   // parallel_threshold (sequential for small graphs)
    );

    scores.into_iter().map(|s| s.unwrap_or(0.0)).collect()
}

/// Closeness centrality with the Wasserman–Faust correction for
/// disconnected graphs: `(r / Σd) × (r / (n - 1))` over the `r` reachable nodes.
pub fn closeness_centrality(simple: &SimpleGraph) -> Vec<f64> {
    let n = simple.node_count();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|source| {
            let dist = bfs_distances(&simple.adjacency, source, None);
            let (reachable, total) = dist
                .iter()
                .flatten()
                .filter(|&&d| d > 0)
                .fold((0usize, 0usize), |(r, t), &d| (r + 1, t + d));
            if total == 0 {
                return 0.0;
            }
            let r = reachable as f64;
            (r / total as f64) * (r / (n - 1) as f64)
        })
        .collect()
}

/// Mean of `1 / d(u, v)` over all reachable ordered pairs `u ≠ v`.
pub fn global_efficiency(adjacency: &[Vec<usize>]) -> f64 {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for source in 0..adjacency.len() {
        for d in bfs_distances(adjacency, source, None).into_iter().flatten() {
            if d > 0 {
                sum += 1.0 / d as f64;
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        sum / pairs as f64
    }
}

// ============================================================================
// PageRank (power iteration on the directed multigraph)
// ============================================================================

/// Strength-weighted PageRank.
///
/// Parallel relations each contribute their strength. Nodes without outgoing
/// strength are dangling and redistribute uniformly. Scores sum to 1.
pub fn pagerank(
    graph: &ConflictGraph,
    damping: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Vec<f64> {
    let g = &graph.graph;
    let n = g.node_count();
    if n == 0 {
        return Vec::new();
    }

    let mut out_links: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut out_strength: Vec<f64> = vec![0.0; n];
    for edge in g.edge_references() {
        let (s, t, w) = (edge.source().index(), edge.target().index(), edge.weight().strength);
        if w > 0.0 {
            out_links[s].push((t, w));
            out_strength[s] += w;
        }
    }

    let initial = 1.0 / n as f64;
    let mut scores: Vec<f64> = vec![initial; n];
    let mut new_scores: Vec<f64> = vec![0.0; n];

    for _ in 0..max_iterations {
        let dangling: f64 = (0..n)
            .filter(|&i| out_strength[i] <= 0.0)
            .map(|i| scores[i])
            .sum();
        let base = (1.0 - damping) / n as f64 + damping * dangling / n as f64;
        for s in new_scores.iter_mut() {
            *s = base;
        }

        for i in 0..n {
            if out_strength[i] > 0.0 {
                let share = damping * scores[i] / out_strength[i];
                for &(j, w) in &out_links[i] {
                    new_scores[j] += share * w;
                }
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(new_scores.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();

        std::mem::swap(&mut scores, &mut new_scores);

        if diff < tolerance {
            break;
        }
    }

    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        for s in scores.iter_mut() {
            *s /= total;
        }
    }
    scores
}

// ============================================================================
// Community Detection — Louvain (custom implementation)
// ============================================================================

/// Detect communities with Louvain-style local moving on the simple projection.
///
/// Returns a contiguous community id per node, numbered by first appearance.
/// Fails on a graph without edges, where modularity is undefined, and when
/// nodes are still moving after `max_iterations` passes.
pub fn louvain_communities(
    simple: &SimpleGraph,
    resolution: f64,
    max_iterations: usize,
) -> Result<Vec<usize>, AlgorithmError> {
    let n = simple.node_count();
    if n == 0 {
        return Ok(Vec::new());
    }
    let adj = &simple.adjacency;
    let node_strengths: Vec<f64> = adj.iter().map(|nb| nb.len() as f64).collect();
    let total_weight: f64 = node_strengths.iter().sum::<f64>() / 2.0;
    if total_weight == 0.0 {
        return Err(AlgorithmError::degenerate("louvain", "graph has no edges"));
    }
    let m2 = 2.0 * total_weight;

    // Initialize: each node in its own community
    let mut community: Vec<usize> = (0..n).collect();
    let mut comm_total_strength: Vec<f64> = node_strengths.clone();

    let mut improved = true;
    let mut iterations = 0;
    while improved && iterations < max_iterations {
        improved = false;
        iterations += 1;

        for node_idx in 0..n {
            let current_comm = community[node_idx];

            // Sum of edge weights from this node to each neighboring community
            let mut comm_weights: HashMap<usize, f64> = HashMap::new();
            for &neighbor in &adj[node_idx] {
                *comm_weights.entry(community[neighbor]).or_default() += 1.0;
            }

            let w_in_current = comm_weights.get(&current_comm).copied().unwrap_or(0.0);
            let ki = node_strengths[node_idx];
            let sigma_tot_current = comm_total_strength[current_comm];
            let remove_cost =
                w_in_current / m2 - resolution * ki * (sigma_tot_current - ki) / (m2 * m2);

            // Iterate candidates in a fixed order so runs are reproducible
            let mut candidates: Vec<(usize, f64)> = comm_weights.into_iter().collect();
            candidates.sort_by_key(|&(c, _)| c);

            let mut best_comm = current_comm;
            let mut best_gain = 0.0;
            for (target_comm, w_to_target) in candidates {
                if target_comm == current_comm {
                    continue;
                }
                let sigma_tot_target = comm_total_strength[target_comm];
                let insert_cost = w_to_target / m2 - resolution * ki * sigma_tot_target / (m2 * m2);
                let gain = insert_cost - remove_cost;
                if gain > best_gain + 1e-12 {
                    best_gain = gain;
                    best_comm = target_comm;
                }
            }

            if best_comm != current_comm {
                comm_total_strength[current_comm] -= ki;
                comm_total_strength[best_comm] += ki;
                community[node_idx] = best_comm;
                improved = true;
            }
        }
    }

    if improved {
        return Err(AlgorithmError::not_converged("louvain", max_iterations));
    }
    Ok(renumber(&community))
}

/// Renumber labels to be contiguous (0, 1, 2, ...) by first appearance.
pub fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut remap: HashMap<usize, usize> = HashMap::new();
    labels
        .iter()
        .map(|label| {
            let next = remap.len();
            *remap.entry(*label).or_insert(next)
        })
        .collect()
}

/// Newman's modularity Q of a partition of the (unweighted) simple projection.
pub fn modularity(simple: &SimpleGraph, community: &[usize]) -> f64 {
    let adj = &simple.adjacency;
    let m2: f64 = adj.iter().map(|nb| nb.len() as f64).sum();
    if m2 == 0.0 {
        return 0.0;
    }

    let communities = community.iter().copied().max().map_or(0, |c| c + 1);
    let mut internal = vec![0.0; communities];
    let mut degree_sum = vec![0.0; communities];
    for (i, neighbors) in adj.iter().enumerate() {
        degree_sum[community[i]] += neighbors.len() as f64;
        for &j in neighbors {
            if community[i] == community[j] {
                internal[community[i]] += 1.0;
            }
        }
    }

    // Each undirected edge is counted twice in the adjacency lists.
    internal
        .iter()
        .zip(degree_sum.iter())
        .map(|(l, d)| l / m2 - (d / m2).powi(2))
        .sum()
}

// ============================================================================
// Tests
// ============================================================================
