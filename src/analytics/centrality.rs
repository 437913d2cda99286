//! Multi-measure node centrality.
//!
//! Degree, betweenness, closeness and eigenvector centrality run on the simple
//! projection; PageRank, HITS and Katz run on the strength-weighted directed
//! multigraph. Iterative measures that fail fall back to degree centrality and
//! say so in [`CentralityResult::methods`].

use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::config::CentralityConfig;
use super::intensity::IntensityModel;
use super::outcome::{FallbackChain, MethodReport};
use super::stats;
use crate::error::AlgorithmError;
use crate::graph::algorithms::{
    betweenness_centrality, closeness_centrality, degree_centrality, pagerank,
};
use crate::graph::{ConflictGraph, SimpleGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentralityMeasure {
    Degree,
    Betweenness,
    Closeness,
    Eigenvector,
    PageRank,
    HubScore,
    AuthorityScore,
    Katz,
    Conflict,
    CrossDomain,
}

impl CentralityMeasure {
    pub const ALL: [CentralityMeasure; 10] = [
        Self::Degree,
        Self::Betweenness,
        Self::Closeness,
        Self::Eigenvector,
        Self::PageRank,
        Self::HubScore,
        Self::AuthorityScore,
        Self::Katz,
        Self::Conflict,
        Self::CrossDomain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Degree => "degree",
            Self::Betweenness => "betweenness",
            Self::Closeness => "closeness",
            Self::Eigenvector => "eigenvector",
            Self::PageRank => "page_rank",
            Self::HubScore => "hub_score",
            Self::AuthorityScore => "authority_score",
            Self::Katz => "katz",
            Self::Conflict => "conflict",
            Self::CrossDomain => "cross_domain",
        }
    }
}

impl std::fmt::Display for CentralityMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNode {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalNodes {
    /// Union of the leading entries of every ranking
    pub high_centrality: Vec<String>,
    pub high_conflict: Vec<String>,
    pub cross_domain_bridges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityResult {
    /// Node IDs in graph order; every score vector is aligned with it
    pub node_ids: Vec<String>,
    pub scores: BTreeMap<CentralityMeasure, Vec<f64>>,
    pub rankings: BTreeMap<CentralityMeasure, Vec<RankedNode>>,
    /// Pearson correlation between every pair of measures
    pub correlations: BTreeMap<CentralityMeasure, BTreeMap<CentralityMeasure, f64>>,
    pub critical: CriticalNodes,
    pub methods: BTreeMap<CentralityMeasure, MethodReport>,
}

impl CentralityResult {
    /// Score vector of a measure (empty when absent).
    pub fn scores_of(&self, measure: CentralityMeasure) -> &[f64] {
        self.scores.get(&measure).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn score(&self, measure: CentralityMeasure, id: &str) -> Option<f64> {
        let position = self.node_ids.iter().position(|n| n == id)?;
        self.scores_of(measure).get(position).copied()
    }

    /// Highest-ranked node of a measure.
    pub fn top(&self, measure: CentralityMeasure) -> Option<&RankedNode> {
        self.rankings.get(&measure).and_then(|r| r.first())
    }
}

pub fn analyze_centrality(graph: &ConflictGraph) -> CentralityResult {
    analyze_centrality_with(graph, None, &CentralityConfig::default())
}

pub fn analyze_centrality_with(
    graph: &ConflictGraph,
    intensity: Option<&IntensityModel>,
    config: &CentralityConfig,
) -> CentralityResult {
    let simple = graph.to_simple();
    let node_ids: Vec<String> = (0..simple.node_count())
        .map(|i| simple.node_id(i).to_string())
        .collect();
    let degree = degree_centrality(&simple);

    let mut scores = BTreeMap::new();
    let mut methods = BTreeMap::new();
    let mut record = |measure: CentralityMeasure, values: Vec<f64>, report: MethodReport| {
        scores.insert(measure, values);
        methods.insert(measure, report);
    };

    record(CentralityMeasure::Degree, degree.clone(), MethodReport::primary("degree"));
    record(
        CentralityMeasure::Betweenness,
        betweenness_centrality(&simple),
        MethodReport::primary("brandes"),
    );
    record(
        CentralityMeasure::Closeness,
        closeness_centrality(&simple),
        MethodReport::primary("wasserman_faust"),
    );
    record(
        CentralityMeasure::PageRank,
        pagerank(
            graph,
            config.pagerank_damping,
            config.tolerance,
            config.pagerank_max_iterations,
        ),
        MethodReport::primary("power_iteration"),
    );

    let eigen = FallbackChain::new()
        .attempt("eigenvector", || eigenvector_centrality(&simple, config))
        .or_else("degree", || degree.clone());
    record(CentralityMeasure::Eigenvector, eigen.value, eigen.report);

    let hits_scores = FallbackChain::new()
        .attempt("hits", || hits(graph, config))
        .or_else("degree", || (degree.clone(), degree.clone()));
    let (hub, authority) = hits_scores.value;
    record(CentralityMeasure::HubScore, hub, hits_scores.report.clone());
    record(CentralityMeasure::AuthorityScore, authority, hits_scores.report);

    let katz = FallbackChain::new()
        .attempt("katz", || katz_centrality(graph, config))
        .or_else("degree", || degree.clone());
    record(CentralityMeasure::Katz, katz.value, katz.report);

    let (conflict, conflict_method) = match intensity {
        Some(model) => (model.node_vector(graph), "node_intensity"),
        None => (max_strength_sums(&simple), "max_strength"),
    };
    record(CentralityMeasure::Conflict, conflict, MethodReport::primary(conflict_method));
    record(
        CentralityMeasure::CrossDomain,
        cross_domain_neighbors(&simple, graph),
        MethodReport::primary("cross_domain_neighbors"),
    );

    let rankings: BTreeMap<CentralityMeasure, Vec<RankedNode>> = scores
        .iter()
        .map(|(&measure, values)| (measure, rank(&node_ids, values, config.top_k)))
        .collect();
    let correlations = correlation_matrix(&scores);
    let critical = critical_nodes(&node_ids, &scores, &rankings, config);

    debug!(
        "Centrality: {} nodes, {} measures fell back",
        node_ids.len(),
        methods.values().filter(|m| m.used_fallback()).count()
    );

    CentralityResult {
        node_ids,
        scores,
        rankings,
        correlations,
        critical,
        methods,
    }
}

/// Top `k` nodes by descending score, ties broken by ID.
pub fn rank(node_ids: &[String], values: &[f64], k: usize) -> Vec<RankedNode> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .total_cmp(&values[a])
            .then_with(|| node_ids[a].cmp(&node_ids[b]))
    });
    order
        .into_iter()
        .take(k)
        .map(|i| RankedNode {
            id: node_ids[i].clone(),
            score: values[i],
        })
        .collect()
}

/// Power iteration on `A + I`, L2-normalized.
fn eigenvector_centrality(
    simple: &SimpleGraph,
    config: &CentralityConfig,
) -> Result<Vec<f64>, AlgorithmError> {
    let n = simple.node_count();
    if n == 0 {
        return Ok(Vec::new());
    }
    if simple.edge_count() == 0 {
        return Err(AlgorithmError::degenerate("eigenvector", "graph has no edges"));
    }

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..config.max_iterations {
        let mut next: Vec<f64> = x.clone();
        for (i, neighbors) in simple.adjacency.iter().enumerate() {
            for &j in neighbors {
                next[i] += x[j];
            }
        }
        let norm = next.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(AlgorithmError::degenerate("eigenvector", "zero norm"));
        }
        for v in next.iter_mut() {
            *v /= norm;
        }
        let diff: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if diff < n as f64 * config.tolerance {
            return Ok(x);
        }
    }
    Err(AlgorithmError::not_converged("eigenvector", config.max_iterations))
}

/// Strength-weighted directed links `(source, target, weight)`.
fn weighted_links(graph: &ConflictGraph) -> Vec<(usize, usize, f64)> {
    graph
        .graph
        .edge_references()
        .filter(|e| e.weight().strength > 0.0)
        .map(|e| (e.source().index(), e.target().index(), e.weight().strength))
        .collect()
}

fn l2_normalize(values: &mut [f64]) -> bool {
    let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for v in values.iter_mut() {
        *v /= norm;
    }
    true
}

fn sum_normalize(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
    values
}

/// HITS hub and authority scores, each normalized to sum 1.
fn hits(
    graph: &ConflictGraph,
    config: &CentralityConfig,
) -> Result<(Vec<f64>, Vec<f64>), AlgorithmError> {
    let n = graph.node_count();
    if n == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let links = weighted_links(graph);
    if links.is_empty() {
        return Err(AlgorithmError::degenerate("hits", "graph has no weighted edges"));
    }

    let mut hub = vec![1.0 / n as f64; n];
    let mut authority = vec![0.0; n];
    for _ in 0..config.max_iterations {
        let mut next_authority = vec![0.0; n];
        for &(s, t, w) in &links {
            next_authority[t] += w * hub[s];
        }
        if !l2_normalize(&mut next_authority) {
            return Err(AlgorithmError::degenerate("hits", "zero authority vector"));
        }
        let mut next_hub = vec![0.0; n];
        for &(s, t, w) in &links {
            next_hub[s] += w * next_authority[t];
        }
        if !l2_normalize(&mut next_hub) {
            return Err(AlgorithmError::degenerate("hits", "zero hub vector"));
        }

        let diff: f64 = hub.iter().zip(&next_hub).map(|(a, b)| (a - b).abs()).sum();
        hub = next_hub;
        authority = next_authority;
        if diff < n as f64 * config.tolerance {
            return Ok((sum_normalize(hub), sum_normalize(authority)));
        }
    }
    Err(AlgorithmError::not_converged("hits", config.max_iterations))
}

/// Katz centrality `x = α·Aᵀx + β` on incoming strength, L2-normalized.
fn katz_centrality(
    graph: &ConflictGraph,
    config: &CentralityConfig,
) -> Result<Vec<f64>, AlgorithmError> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(Vec::new());
    }
    let links = weighted_links(graph);

    let mut x = vec![0.0; n];
    for _ in 0..config.max_iterations {
        let mut next = vec![config.katz_beta; n];
        for &(s, t, w) in &links {
            next[t] += config.katz_alpha * w * x[s];
        }
        if next.iter().any(|v| !v.is_finite()) {
            return Err(AlgorithmError::not_converged("katz", config.max_iterations));
        }
        let diff: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        x = next;
        if diff < n as f64 * config.tolerance {
            if !l2_normalize(&mut x) {
                return Err(AlgorithmError::degenerate("katz", "zero vector"));
            }
            return Ok(x);
        }
    }
    Err(AlgorithmError::not_converged("katz", config.max_iterations))
}

/// Σ over neighbors of the pair's strongest relation.
fn max_strength_sums(simple: &SimpleGraph) -> Vec<f64> {
    (0..simple.node_count())
        .map(|i| {
            simple.adjacency[i]
                .iter()
                .filter_map(|&j| simple.edge(i, j))
                .map(|e| e.max_strength)
                .sum()
        })
        .collect()
}

fn cross_domain_neighbors(simple: &SimpleGraph, graph: &ConflictGraph) -> Vec<f64> {
    let entities: Vec<_> = graph.graph.node_weights().collect();
    (0..simple.node_count())
        .map(|i| {
            simple.adjacency[i]
                .iter()
                .filter(|&&j| !entities[i].shares_domain(entities[j]))
                .count() as f64
        })
        .collect()
}

fn correlation_matrix(
    scores: &BTreeMap<CentralityMeasure, Vec<f64>>,
) -> BTreeMap<CentralityMeasure, BTreeMap<CentralityMeasure, f64>> {
    scores
        .iter()
        .map(|(&a, xs)| {
            let row = scores
                .iter()
                .map(|(&b, ys)| {
                    let r = if a == b && stats::variance(xs) > 0.0 {
                        1.0
                    } else {
                        stats::pearson(xs, ys)
                    };
                    (b, r)
                })
                .collect();
            (a, row)
        })
        .collect()
}

fn critical_nodes(
    node_ids: &[String],
    scores: &BTreeMap<CentralityMeasure, Vec<f64>>,
    rankings: &BTreeMap<CentralityMeasure, Vec<RankedNode>>,
    config: &CentralityConfig,
) -> CriticalNodes {
    let high_centrality: BTreeSet<String> = rankings
        .values()
        .flat_map(|r| r.iter().take(config.critical_top_k).map(|n| n.id.clone()))
        .collect();

    let above = |measure: CentralityMeasure, percentile: f64, positive_only: bool| {
        let values = scores.get(&measure).map(Vec::as_slice).unwrap_or(&[]);
        let threshold = stats::percentile(values, percentile);
        let mut selected: Vec<usize> = (0..values.len())
            .filter(|&i| values[i] >= threshold && (!positive_only || values[i] > 0.0))
            .collect();
        selected.sort_by(|&a, &b| {
            values[b]
                .total_cmp(&values[a])
                .then_with(|| node_ids[a].cmp(&node_ids[b]))
        });
        selected
            .into_iter()
            .map(|i| node_ids[i].clone())
            .collect::<Vec<String>>()
    };

    CriticalNodes {
        high_centrality: high_centrality.into_iter().collect(),
        high_conflict: above(CentralityMeasure::Conflict, config.high_conflict_percentile, false),
        cross_domain_bridges: above(
            CentralityMeasure::CrossDomain,
            config.cross_domain_percentile,
            true,
        ),
    }
}
