//! Structural statistics of a conflict graph.
//!
//! Everything except the raw edge count is measured on the undirected simple
//! projection. Path metrics are restricted to the largest connected component
//! so that they stay finite on fragmented networks.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::config::TopologyConfig;
use super::stats;
use crate::graph::algorithms::{
    average_clustering, bfs_distances, connected_components, induced_adjacency, local_clustering,
    transitivity,
};
use crate::graph::generators::{erdos_renyi, ring_lattice};
use crate::graph::{ConflictGraph, SimpleGraph};

/// Shortest-path statistics of the largest component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathMetrics {
    pub average_shortest_path: f64,
    pub diameter: usize,
    pub radius: usize,
    pub eccentricity_mean: f64,
    pub eccentricity_std: f64,
    pub eccentricity_min: usize,
    pub eccentricity_max: usize,
}

/// Log–log least-squares fit of the degree distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawFit {
    pub exponent: f64,
    pub r_squared: f64,
}

/// Small-world indices against single random and lattice baselines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmallWorld {
    pub sigma: Option<f64>,
    pub omega: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyMetrics {
    pub node_count: usize,
    /// Directed relations, parallel edges counted separately
    pub edge_count: usize,
    pub simple_edge_count: usize,
    pub density: f64,
    pub degree_distribution: BTreeMap<usize, usize>,
    pub mean_degree: f64,
    pub degree_variance: f64,
    pub min_degree: usize,
    pub max_degree: usize,
    pub component_count: usize,
    /// Component sizes, largest first
    pub component_sizes: Vec<usize>,
    pub largest_component_size: usize,
    pub is_connected: bool,
    pub paths: PathMetrics,
    pub average_clustering: f64,
    pub transitivity: f64,
    pub power_law: Option<PowerLawFit>,
    pub assortativity: f64,
    /// `None` when the graph is disconnected or too small
    pub small_world: Option<SmallWorld>,
}

/// Analyze topology with default configuration.
pub fn analyze_topology(graph: &ConflictGraph) -> TopologyMetrics {
    analyze_topology_with(graph, &TopologyConfig::default())
}

pub fn analyze_topology_with(graph: &ConflictGraph, config: &TopologyConfig) -> TopologyMetrics {
    let simple = graph.to_simple();
    let n = simple.node_count();

    let degrees: Vec<usize> = (0..n).map(|i| simple.degree(i)).collect();
    let degree_values: Vec<f64> = degrees.iter().map(|&d| d as f64).collect();
    let mut degree_distribution: BTreeMap<usize, usize> = BTreeMap::new();
    for &d in &degrees {
        *degree_distribution.entry(d).or_default() += 1;
    }

    let components = connected_components(&simple.adjacency, None);
    let component_sizes: Vec<usize> = components.iter().map(|c| c.len()).collect();
    let largest_component_size = component_sizes.first().copied().unwrap_or(0);
    let is_connected = n > 0 && components.len() == 1;

    let paths = components
        .first()
        .map(|largest| path_metrics(&induced_adjacency(&simple.adjacency, largest)))
        .unwrap_or_default();

    let avg_clustering = average_clustering(&simple.adjacency);
    let small_world = if is_connected && n >= config.small_world_min_nodes {
        Some(small_world(&simple, avg_clustering, paths.average_shortest_path, config.seed))
    } else {
        None
    };

    debug!(
        "Topology: n={} simple_edges={} components={}",
        n,
        simple.edge_count(),
        components.len()
    );

    TopologyMetrics {
        node_count: n,
        edge_count: graph.edge_count(),
        simple_edge_count: simple.edge_count(),
        density: simple.density(),
        mean_degree: stats::mean(&degree_values),
        degree_variance: stats::variance(&degree_values),
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        max_degree: degrees.iter().copied().max().unwrap_or(0),
        degree_distribution,
        component_count: components.len(),
        component_sizes,
        largest_component_size,
        is_connected,
        paths,
        average_clustering: avg_clustering,
        transitivity: transitivity(&simple.adjacency),
        power_law: fit_power_law(&degrees),
        assortativity: degree_assortativity(&simple),
        small_world,
    }
}

/// Path statistics of a connected adjacency (all zero below two nodes).
fn path_metrics(adjacency: &[Vec<usize>]) -> PathMetrics {
    let n = adjacency.len();
    if n < 2 {
        return PathMetrics::default();
    }

    let mut total = 0usize;
    let mut pairs = 0usize;
    let mut eccentricities = Vec::with_capacity(n);
    for source in 0..n {
        let mut ecc = 0usize;
        for d in bfs_distances(adjacency, source, None).into_iter().flatten() {
            if d > 0 {
                total += d;
                pairs += 1;
                ecc = ecc.max(d);
            }
        }
        eccentricities.push(ecc);
    }

    let ecc_values: Vec<f64> = eccentricities.iter().map(|&e| e as f64).collect();
    PathMetrics {
        average_shortest_path: if pairs == 0 {
            0.0
        } else {
            total as f64 / pairs as f64
        },
        diameter: eccentricities.iter().copied().max().unwrap_or(0),
        radius: eccentricities.iter().copied().min().unwrap_or(0),
        eccentricity_mean: stats::mean(&ecc_values),
        eccentricity_std: stats::std_dev(&ecc_values),
        eccentricity_min: eccentricities.iter().copied().min().unwrap_or(0),
        eccentricity_max: eccentricities.iter().copied().max().unwrap_or(0),
    }
}

/// Average shortest path over reachable pairs of an arbitrary adjacency.
fn average_path_length(adjacency: &[Vec<usize>]) -> f64 {
    let mut total = 0usize;
    let mut pairs = 0usize;
    for source in 0..adjacency.len() {
        for d in bfs_distances(adjacency, source, None).into_iter().flatten() {
            if d > 0 {
                total += d;
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        total as f64 / pairs as f64
    }
}

fn fit_power_law(degrees: &[usize]) -> Option<PowerLawFit> {
    let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
    for &d in degrees.iter().filter(|&&d| d > 0) {
        *freq.entry(d).or_default() += 1;
    }
    if freq.len() < 3 {
        return None;
    }
    let points: Vec<(f64, f64)> = freq
        .iter()
        .map(|(&d, &count)| ((d as f64).ln(), (count as f64).ln()))
        .collect();
    stats::linear_fit(&points).map(|fit| PowerLawFit {
        exponent: -fit.slope,
        r_squared: fit.r_squared,
    })
}

/// Pearson correlation of endpoint degrees, both orientations of every edge.
fn degree_assortativity(simple: &SimpleGraph) -> f64 {
    let pairs = simple.edge_pairs();
    let mut xs = Vec::with_capacity(pairs.len() * 2);
    let mut ys = Vec::with_capacity(pairs.len() * 2);
    for (a, b) in pairs {
        let (da, db) = (simple.degree(a) as f64, simple.degree(b) as f64);
        xs.push(da);
        ys.push(db);
        xs.push(db);
        ys.push(da);
    }
    stats::pearson(&xs, &ys)
}

fn small_world(simple: &SimpleGraph, clustering: f64, path_length: f64, seed: u64) -> SmallWorld {
    let n = simple.node_count();
    let mut rng = StdRng::seed_from_u64(seed);

    let random = erdos_renyi(n, simple.density(), &mut rng);
    let c_rand = average_clustering(&random);
    let l_rand = average_path_length(&random);

    let mean_degree = 2.0 * simple.edge_count() as f64 / n as f64;
    let k = ((mean_degree / 2.0).round() as usize * 2).max(2);
    let lattice = ring_lattice(n, k);
    let c_latt = local_clustering(&lattice).iter().sum::<f64>() / n as f64;

    let sigma = if c_rand > 0.0 && l_rand > 0.0 && path_length > 0.0 {
        Some((clustering / c_rand) / (path_length / l_rand))
    } else {
        None
    };
    let omega = if path_length > 0.0 && c_latt > 0.0 {
        Some(l_rand / path_length - clustering / c_latt)
    } else {
        None
    };
    debug!(
        "Small world baselines: C_rand={:.4} L_rand={:.4} C_latt={:.4}",
        c_rand, l_rand, c_latt
    );

    SmallWorld { sigma, omega }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, Entity, EntityType, Relation, RelationType};

    fn graph_from_pairs(n: usize, pairs: &[(usize, usize)]) -> ConflictGraph {
        let nodes = (0..n)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Actor, &["d"]))
            .collect();
        let edges = pairs
            .iter()
            .map(|&(a, b)| {
                Relation::new(&format!("n{}", a), &format!("n{}", b), RelationType::Opposition, 0.5)
            })
            .collect();
        build_graph(nodes, edges)
    }

    fn complete(n: usize) -> ConflictGraph {
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                pairs.push((i, j));
            }
        }
        graph_from_pairs(n, &pairs)
    }

    #[test]
    fn test_complete_graph_k4() {
        let m = analyze_topology(&complete(4));
        assert_eq!(m.node_count, 4);
        assert_eq!(m.simple_edge_count, 6);
        assert!((m.density - 1.0).abs() < 1e-12);
        assert!((m.average_clustering - 1.0).abs() < 1e-12);
        assert!((m.transitivity - 1.0).abs() < 1e-12);
        assert_eq!(m.paths.diameter, 1);
        assert_eq!(m.paths.radius, 1);
        assert!((m.paths.average_shortest_path - 1.0).abs() < 1e-12);
        assert!(m.is_connected);
        assert_eq!(m.degree_distribution.get(&3), Some(&4));
        // Too small for small-world indices
        assert!(m.small_world.is_none());
    }

    #[test]
    fn test_empty_graph() {
        let m = analyze_topology(&ConflictGraph::new());
        assert_eq!(m.node_count, 0);
        assert_eq!(m.density, 0.0);
        assert_eq!(m.component_count, 0);
        assert!(!m.is_connected);
        assert_eq!(m.paths, PathMetrics::default());
        assert!(m.power_law.is_none());
        assert_eq!(m.assortativity, 0.0);
    }

    #[test]
    fn test_disconnected_paths_use_largest_component() {
        // Chain of 4 plus an isolated pair
        let g = graph_from_pairs(6, &[(0, 1), (1, 2), (2, 3), (4, 5)]);
        let m = analyze_topology(&g);
        assert_eq!(m.component_count, 2);
        assert_eq!(m.component_sizes, vec![4, 2]);
        assert_eq!(m.largest_component_size, 4);
        assert_eq!(m.paths.diameter, 3);
        assert_eq!(m.paths.radius, 2);
        assert!(m.small_world.is_none());
    }

    #[test]
    fn test_star_is_disassortative() {
        let pairs: Vec<(usize, usize)> = (1..=9).map(|i| (0, i)).collect();
        let m = analyze_topology(&graph_from_pairs(10, &pairs));
        assert!(m.assortativity < 0.0);
        assert_eq!(m.max_degree, 9);
        assert_eq!(m.min_degree, 1);
        assert_eq!(m.average_clustering, 0.0);
    }

    #[test]
    fn test_power_law_needs_three_distinct_degrees() {
        // Chain: degrees {1, 2} only
        let chain = graph_from_pairs(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert!(analyze_topology(&chain).power_law.is_none());

        // Degrees 3, 2, 2, 1, 1, 1
        let g = graph_from_pairs(6, &[(0, 1), (0, 2), (0, 3), (1, 4), (2, 5)]);
        let fit = analyze_topology(&g).power_law.unwrap();
        assert!(fit.exponent.is_finite());
        assert!(fit.r_squared <= 1.0 + 1e-12);
    }

    #[test]
    fn test_small_world_is_deterministic() {
        // Ring of 12 with chords
        let mut pairs: Vec<(usize, usize)> = (0..12).map(|i| (i, (i + 1) % 12)).collect();
        pairs.extend([(0, 6), (3, 9)]);
        let g = graph_from_pairs(12, &pairs);
        let a = analyze_topology(&g);
        let b = analyze_topology(&g);
        assert!(a.small_world.is_some());
        assert_eq!(a.small_world, b.small_world);
    }

    #[test]
    fn test_parallel_relations_count_once_in_projection() {
        let nodes = vec![
            Entity::new("a", EntityType::Actor, &[]),
            Entity::new("b", EntityType::Actor, &[]),
        ];
        let edges = vec![
            Relation::new("a", "b", RelationType::Opposition, 0.5),
            Relation::new("a", "b", RelationType::Competition, 0.5),
            Relation::new("b", "a", RelationType::Constraint, 0.5),
        ];
        let m = analyze_topology(&build_graph(nodes, edges));
        assert_eq!(m.edge_count, 3);
        assert_eq!(m.simple_edge_count, 1);
        assert!((m.density - 1.0).abs() < 1e-12);
    }
}
