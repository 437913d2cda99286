//! Community structure and cross-domain mixing.
//!
//! Partitioning runs as a fallback chain: Louvain, then spectral clustering,
//! then a single community holding every node. The chosen path is reported in
//! [`CommunityStructure::method`].

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::config::CommunityConfig;
use super::outcome::{FallbackChain, MethodReport};
use super::spectral::spectral_clustering;
use super::stats;
use crate::graph::algorithms::{betweenness_centrality, louvain_communities, modularity};
use crate::graph::{ConflictGraph, SimpleGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    pub id: usize,
    pub size: usize,
    /// Member IDs, sorted
    pub members: Vec<String>,
    /// Dominant domain, or `mixed_<id>` when no domain covers a majority
    pub label: String,
    pub internal_edges: usize,
    pub external_edges: usize,
    pub internal_density: f64,
    /// `external / (internal + external)`
    pub conductance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainMixing {
    pub cross_domain_edges: usize,
    pub intra_domain_edges: usize,
    /// `cross / (cross + intra)`, 0 without classified edges
    pub cross_domain_ratio: f64,
    /// Row and column labels of `co_occurrence`
    pub domains: Vec<String>,
    /// Edge counts between domain tags of the two endpoints
    pub co_occurrence: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityStructure {
    pub method: MethodReport,
    pub modularity: f64,
    pub community_count: usize,
    pub communities: Vec<Community>,
    /// Community id per entity
    pub membership: BTreeMap<String, usize>,
    pub domain_mixing: DomainMixing,
    /// Nodes at or above the configured betweenness percentile
    pub bridge_nodes: Vec<String>,
}

pub fn discover_communities(graph: &ConflictGraph) -> CommunityStructure {
    discover_communities_with(graph, &CommunityConfig::default())
}

pub fn discover_communities_with(graph: &ConflictGraph, config: &CommunityConfig) -> CommunityStructure {
    let simple = graph.to_simple();
    let n = simple.node_count();

    let resolved = FallbackChain::new()
        .attempt("louvain", || {
            louvain_communities(&simple, config.louvain_resolution, config.louvain_max_iterations)
        })
        .attempt("spectral", || {
            spectral_clustering(&simple, config).map(|partition| partition.labels)
        })
        .or_else("single_community", || vec![0; n]);
    let labels = resolved.value;

    let q = modularity(&simple, &labels);
    let communities = summarize_communities(&simple, graph, &labels);
    let membership = (0..n)
        .map(|i| (simple.node_id(i).to_string(), labels[i]))
        .collect();

    debug!(
        "Communities via {}: {} communities, Q={:.4}",
        resolved.report.method,
        communities.len(),
        q
    );

    CommunityStructure {
        method: resolved.report,
        modularity: q,
        community_count: communities.len(),
        communities,
        membership,
        domain_mixing: domain_mixing(&simple, graph),
        bridge_nodes: bridge_nodes(&simple, config.bridge_percentile),
    }
}

fn summarize_communities(
    simple: &SimpleGraph,
    graph: &ConflictGraph,
    labels: &[usize],
) -> Vec<Community> {
    let count = labels.iter().copied().max().map_or(0, |c| c + 1);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (node, &label) in labels.iter().enumerate() {
        members[label].push(node);
    }
    let mut internal = vec![0usize; count];
    let mut external = vec![0usize; count];
    for (a, b) in simple.edge_pairs() {
        if labels[a] == labels[b] {
            internal[labels[a]] += 1;
        } else {
            external[labels[a]] += 1;
            external[labels[b]] += 1;
        }
    }

    members
        .into_iter()
        .enumerate()
        .map(|(id, nodes)| {
            let size = nodes.len();
            let possible = size * size.saturating_sub(1) / 2;
            let touching = internal[id] + external[id];
            let mut ids: Vec<String> = nodes.iter().map(|&i| simple.node_id(i).to_string()).collect();
            ids.sort();
            Community {
                id,
                size,
                label: community_label(graph, &nodes, id),
                members: ids,
                internal_edges: internal[id],
                external_edges: external[id],
                internal_density: if possible == 0 {
                    0.0
                } else {
                    internal[id] as f64 / possible as f64
                },
                conductance: if touching == 0 {
                    0.0
                } else {
                    external[id] as f64 / touching as f64
                },
            }
        })
        .collect()
}

fn community_label(graph: &ConflictGraph, nodes: &[usize], id: usize) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &node in nodes {
        for domain in &graph.graph[NodeIndex::new(node)].domains {
            *counts.entry(domain.as_str()).or_default() += 1;
        }
    }
    // Ties resolve to the alphabetically first domain
    let dominant = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(d, c)| (*d, *c));
    match dominant {
        Some((domain, count)) if 2 * count > nodes.len() => domain.to_string(),
        _ => format!("mixed_{}", id),
    }
}

fn domain_mixing(simple: &SimpleGraph, graph: &ConflictGraph) -> DomainMixing {
    let domains = graph.domains();
    let position: BTreeMap<&str, usize> = domains
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();
    let mut co_occurrence = vec![vec![0usize; domains.len()]; domains.len()];
    let mut cross = 0usize;
    let mut intra = 0usize;

    for (a, b) in simple.edge_pairs() {
        let ea = &graph.graph[NodeIndex::new(a)];
        let eb = &graph.graph[NodeIndex::new(b)];
        if ea.shares_domain(eb) {
            intra += 1;
        } else {
            cross += 1;
        }
        for da in &ea.domains {
            for db in &eb.domains {
                let (i, j) = (position[da.as_str()], position[db.as_str()]);
                co_occurrence[i][j] += 1;
                if i != j {
                    co_occurrence[j][i] += 1;
                }
            }
        }
    }

    let classified = cross + intra;
    DomainMixing {
        cross_domain_edges: cross,
        intra_domain_edges: intra,
        cross_domain_ratio: if classified == 0 {
            0.0
        } else {
            cross as f64 / classified as f64
        },
        domains,
        co_occurrence,
    }
}

fn bridge_nodes(simple: &SimpleGraph, percentile: f64) -> Vec<String> {
    let betweenness = betweenness_centrality(simple);
    if betweenness.is_empty() {
        return Vec::new();
    }
    let threshold = stats::percentile(&betweenness, percentile);
    let mut bridges: Vec<(usize, f64)> = betweenness
        .iter()
        .enumerate()
        .filter(|(_, &b)| b > 0.0 && b >= threshold)
        .map(|(i, &b)| (i, b))
        .collect();
    bridges.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| simple.node_id(a.0).cmp(simple.node_id(b.0)))
    });
    bridges
        .into_iter()
        .map(|(i, _)| simple.node_id(i).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, Entity, EntityType, Relation, RelationType};

    fn two_triangles() -> ConflictGraph {
        let mut nodes = Vec::new();
        for i in 0..3 {
            nodes.push(Entity::new(&format!("w{}", i), EntityType::Actor, &["west"]));
            nodes.push(Entity::new(&format!("e{}", i), EntityType::Actor, &["east"]));
        }
        let mut edges = Vec::new();
        for side in ["w", "e"] {
            for (a, b) in [(0, 1), (1, 2), (0, 2)] {
                edges.push(Relation::new(
                    &format!("{}{}", side, a),
                    &format!("{}{}", side, b),
                    RelationType::Opposition,
                    1.0,
                ));
            }
        }
        build_graph(nodes, edges)
    }

    #[test]
    fn test_two_triangles() {
        let result = discover_communities(&two_triangles());
        assert_eq!(result.method, MethodReport::primary("louvain"));
        assert_eq!(result.community_count, 2);
        assert!(result.modularity >= 0.35);
        assert_eq!(result.domain_mixing.cross_domain_edges, 0);
        assert_eq!(result.domain_mixing.intra_domain_edges, 6);
        for community in &result.communities {
            assert_eq!(community.size, 3);
            assert_eq!(community.internal_edges, 3);
            assert_eq!(community.conductance, 0.0);
            assert!((community.internal_density - 1.0).abs() < 1e-12);
            assert!(community.label == "west" || community.label == "east");
        }
        assert_eq!(result.membership["w0"], result.membership["w2"]);
        assert_ne!(result.membership["w0"], result.membership["e0"]);
    }

    #[test]
    fn test_spectral_used_when_louvain_does_not_settle() {
        let nodes = (0..8)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Actor, &["d"]))
            .collect();
        let mut edges = Vec::new();
        for offset in [0, 4] {
            for i in 0..4 {
                for j in (i + 1)..4 {
                    edges.push(Relation::new(
                        &format!("n{}", offset + i),
                        &format!("n{}", offset + j),
                        RelationType::Competition,
                        1.0,
                    ));
                }
            }
        }
        edges.push(Relation::new("n0", "n4", RelationType::Competition, 1.0));
        let config = CommunityConfig {
            louvain_max_iterations: 0,
            ..CommunityConfig::default()
        };

        let result = discover_communities_with(&build_graph(nodes, edges), &config);
        assert_eq!(result.method.method, "spectral");
        let tried: Vec<&str> = result.method.fallbacks.iter().map(|f| f.method.as_str()).collect();
        assert_eq!(tried, vec!["louvain"]);
        assert_eq!(result.community_count, 2);
        assert_eq!(result.membership["n1"], result.membership["n3"]);
        assert_ne!(result.membership["n1"], result.membership["n5"]);
        assert!(result.modularity > 0.3);
    }

    #[test]
    fn test_edgeless_graph_falls_back_to_single_community() {
        let nodes = (0..5)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Role, &[]))
            .collect();
        let result = discover_communities(&build_graph(nodes, vec![]));
        assert_eq!(result.method.method, "single_community");
        let tried: Vec<&str> = result.method.fallbacks.iter().map(|f| f.method.as_str()).collect();
        assert_eq!(tried, vec!["louvain", "spectral"]);
        assert_eq!(result.community_count, 1);
        assert_eq!(result.communities[0].size, 5);
        assert_eq!(result.communities[0].label, "mixed_0");
        assert_eq!(result.modularity, 0.0);
    }

    #[test]
    fn test_cross_domain_mixing_and_matrix() {
        let nodes = vec![
            Entity::new("a", EntityType::Actor, &["x"]),
            Entity::new("b", EntityType::Actor, &["y"]),
            Entity::new("c", EntityType::Actor, &["x", "y"]),
            Entity::new("d", EntityType::Actor, &[]),
        ];
        let edges = vec![
            Relation::new("a", "b", RelationType::Opposition, 0.5),
            Relation::new("a", "c", RelationType::Opposition, 0.5),
            Relation::new("c", "d", RelationType::Opposition, 0.5),
        ];
        let mixing = discover_communities(&build_graph(nodes, edges)).domain_mixing;
        // c-d counts as cross-domain: d has no tags to share
        assert_eq!(mixing.cross_domain_edges, 2);
        assert_eq!(mixing.intra_domain_edges, 1);
        assert!((mixing.cross_domain_ratio - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(mixing.domains, vec!["x".to_string(), "y".to_string()]);
        // a-b: (x,y); a-c: (x,x), (x,y)
        assert_eq!(mixing.co_occurrence, vec![vec![1, 2], vec![2, 0]]);
    }

    #[test]
    fn test_untagged_endpoint_is_cross_domain() {
        let nodes = vec![
            Entity::new("a", EntityType::Actor, &["x"]),
            Entity::new("b", EntityType::Actor, &[]),
        ];
        let edges = vec![Relation::new("a", "b", RelationType::Opposition, 1.0)];
        let mixing = discover_communities(&build_graph(nodes, edges)).domain_mixing;
        assert_eq!(mixing.cross_domain_edges, 1);
        assert_eq!(mixing.intra_domain_edges, 0);
        assert!((mixing.cross_domain_ratio - 1.0).abs() < 1e-12);
        assert_eq!(mixing.co_occurrence, vec![vec![0]]);
    }

    #[test]
    fn test_bridge_nodes_on_chain() {
        let nodes = (0..5)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Role, &["d"]))
            .collect();
        let edges = (0..4)
            .map(|i| {
                Relation::new(&format!("n{}", i), &format!("n{}", i + 1), RelationType::Constraint, 1.0)
            })
            .collect();
        let result = discover_communities(&build_graph(nodes, edges));
        assert_eq!(result.bridge_nodes, vec!["n2".to_string()]);
    }

    #[test]
    fn test_empty_graph() {
        let result = discover_communities(&ConflictGraph::new());
        assert_eq!(result.community_count, 0);
        assert!(result.communities.is_empty());
        assert_eq!(result.domain_mixing, DomainMixing::default());
        assert!(result.bridge_nodes.is_empty());
    }
}
