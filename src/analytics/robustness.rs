//! Attack robustness, node vulnerability and systemic risk.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::centrality::{CentralityMeasure, CentralityResult};
use super::config::RobustnessConfig;
use super::intensity::IntensityModel;
use crate::graph::algorithms::{connected_components, degree_centrality, global_efficiency};
use crate::graph::{ConflictGraph, SimpleGraph};

/// State of the network after one removal step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackPoint {
    pub removed_fraction: f64,
    pub removed_count: usize,
    pub components: usize,
    /// Largest remaining component relative to the original node count
    pub largest_component_fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackResult {
    /// Removed fraction at which the network first fragments
    pub threshold: f64,
    pub curve: Vec<AttackPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVulnerability {
    pub id: String,
    pub vulnerability: f64,
    pub failure_probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetrics {
    /// `1 / (1 + components)`
    pub connectivity: f64,
    /// Global efficiency
    pub efficiency: f64,
    /// Density
    pub structural: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobustnessResult {
    pub random_attack: AttackResult,
    pub targeted_attack: AttackResult,
    pub vulnerability: BTreeMap<String, f64>,
    pub failure_probability: BTreeMap<String, f64>,
    /// Most vulnerable nodes, highest first
    pub critical_nodes: Vec<NodeVulnerability>,
    pub resilience: ResilienceMetrics,
    pub systemic_risk: f64,
}

pub fn analyze_robustness(
    graph: &ConflictGraph,
    centrality: Option<&CentralityResult>,
) -> RobustnessResult {
    analyze_robustness_with(graph, centrality, None, &RobustnessConfig::default())
}

pub fn analyze_robustness_with(
    graph: &ConflictGraph,
    centrality: Option<&CentralityResult>,
    intensity: Option<&IntensityModel>,
    config: &RobustnessConfig,
) -> RobustnessResult {
    let simple = graph.to_simple();
    let n = simple.node_count();
    if n == 0 {
        return RobustnessResult::default();
    }
    let ids: Vec<&str> = (0..n).map(|i| simple.node_id(i)).collect();
    let degree = degree_centrality(&simple);

    let random_attack = random_attack(&simple, config);
    let targeted_attack = targeted_attack(&simple, &ids, &degree);

    let vulnerability: Vec<f64> = match centrality {
        Some(result) => {
            let lookup = aligned_scores(result, &ids);
            (0..n)
                .map(|i| {
                    0.3 * lookup(CentralityMeasure::Betweenness, i)
                        + 0.3 * lookup(CentralityMeasure::Degree, i)
                        + 0.2 * lookup(CentralityMeasure::PageRank, i)
                        + 0.2 * lookup(CentralityMeasure::Closeness, i)
                })
                .collect()
        }
        None => degree.clone(),
    };
    let failure: Vec<f64> = (0..n)
        .map(|i| {
            let intensity_term = intensity
                .and_then(|m| m.node_intensity(ids[i]))
                .map_or(0.0, |v| 0.05 * v);
            (0.1 * vulnerability[i] + intensity_term).min(0.9)
        })
        .collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        vulnerability[b]
            .total_cmp(&vulnerability[a])
            .then_with(|| ids[a].cmp(ids[b]))
    });
    order.truncate(config.top_k);
    let critical_nodes: Vec<NodeVulnerability> = order
        .iter()
        .map(|&i| NodeVulnerability {
            id: ids[i].to_string(),
            vulnerability: vulnerability[i],
            failure_probability: failure[i],
        })
        .collect();

    let components = connected_components(&simple.adjacency, None).len();
    let resilience = ResilienceMetrics {
        connectivity: 1.0 / (1.0 + components as f64),
        efficiency: global_efficiency(&simple.adjacency),
        structural: simple.density(),
    };

    let total: f64 = vulnerability.iter().sum();
    let top_share = if total > 0.0 {
        critical_nodes.iter().map(|c| c.vulnerability).sum::<f64>() / total
    } else {
        0.0
    };
    let mut systemic_risk = 0.4 * top_share;
    if resilience.structural < 0.1 {
        systemic_risk += 0.3;
    }
    if components > 1 {
        systemic_risk += 0.3;
    }
    let systemic_risk = systemic_risk.min(1.0);

    debug!(
        "Robustness: random threshold={:.2}, targeted threshold={:.2}, systemic risk={:.3}",
        random_attack.threshold, targeted_attack.threshold, systemic_risk
    );

    RobustnessResult {
        random_attack,
        targeted_attack,
        vulnerability: ids
            .iter()
            .zip(&vulnerability)
            .map(|(id, &v)| (id.to_string(), v))
            .collect(),
        failure_probability: ids
            .iter()
            .zip(&failure)
            .map(|(id, &p)| (id.to_string(), p))
            .collect(),
        critical_nodes,
        resilience,
        systemic_risk,
    }
}

/// Score lookup by node position, tolerating results computed on another
/// node ordering.
fn aligned_scores<'a>(
    result: &'a CentralityResult,
    ids: &[&str],
) -> impl Fn(CentralityMeasure, usize) -> f64 + 'a {
    let position: HashMap<&str, usize> = result
        .node_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    let mapped: Vec<Option<usize>> = ids.iter().map(|id| position.get(id).copied()).collect();
    move |measure, node| {
        mapped[node]
            .and_then(|p| result.scores_of(measure).get(p).copied())
            .unwrap_or(0.0)
    }
}

fn attack_point(simple: &SimpleGraph, removed: &[bool], count: usize) -> AttackPoint {
    let n = simple.node_count();
    let components = connected_components(&simple.adjacency, Some(removed));
    AttackPoint {
        removed_fraction: count as f64 / n as f64,
        removed_count: count,
        components: components.len(),
        largest_component_fraction: components.first().map_or(0.0, |c| c.len() as f64 / n as f64),
    }
}

/// Remove `floor(f·n)` uniformly sampled nodes for each fraction step.
fn random_attack(simple: &SimpleGraph, config: &RobustnessConfig) -> AttackResult {
    let n = simple.node_count();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let max_fraction = if config.max_fraction.is_finite() {
        config.max_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    // A non-positive step only evaluates the intact graph
    let steps = if config.fraction_step > 0.0 && config.fraction_step.is_finite() {
        (max_fraction / config.fraction_step + 1e-9).floor() as usize
    } else {
        warn!(
            "Random attack step {} is not positive, evaluating the intact graph only",
            config.fraction_step
        );
        0
    };

    let mut threshold = None;
    let mut curve = Vec::with_capacity(steps + 1);
    for step in 0..=steps {
        let fraction = step as f64 * config.fraction_step;
        let count = ((fraction * n as f64) + 1e-9).floor() as usize;
        let mut removed = vec![false; n];
        for i in rand::seq::index::sample(&mut rng, n, count.min(n)).into_iter() {
            removed[i] = true;
        }
        let mut point = attack_point(simple, &removed, count.min(n));
        point.removed_fraction = fraction;
        if threshold.is_none() && point.components > 1 {
            threshold = Some(fraction);
        }
        curve.push(point);
    }

    AttackResult {
        threshold: threshold.unwrap_or(max_fraction),
        curve,
    }
}

/// Remove nodes one at a time by descending degree centrality.
fn targeted_attack(simple: &SimpleGraph, ids: &[&str], degree: &[f64]) -> AttackResult {
    let n = simple.node_count();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| degree[b].total_cmp(&degree[a]).then_with(|| ids[a].cmp(ids[b])));

    let mut removed = vec![false; n];
    let mut threshold = None;
    let mut curve = Vec::with_capacity(n + 1);
    for count in 0..=n {
        if count > 0 {
            removed[order[count - 1]] = true;
        }
        let point = attack_point(simple, &removed, count);
        if threshold.is_none() && (count == n || point.components > 1) {
            threshold = Some(point.removed_fraction);
        }
        curve.push(point);
        if threshold.is_some() {
            break;
        }
    }

    AttackResult {
        threshold: threshold.unwrap_or(1.0),
        curve,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::centrality::analyze_centrality;
    use crate::graph::{build_graph, Entity, EntityType, Relation, RelationType};

    fn star(leaves: usize) -> ConflictGraph {
        let mut nodes = vec![Entity::new("hub", EntityType::Institution, &["d"])];
        let mut edges = Vec::new();
        for i in 0..leaves {
            let id = format!("leaf_{}", i);
            nodes.push(Entity::new(&id, EntityType::Actor, &["d"]));
            edges.push(Relation::new("hub", &id, RelationType::Opposition, 1.0));
        }
        build_graph(nodes, edges)
    }

    fn complete(n: usize) -> ConflictGraph {
        let nodes = (0..n)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Actor, &["d"]))
            .collect();
        let mut edges = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                edges.push(Relation::new(
                    &format!("n{}", i),
                    &format!("n{}", j),
                    RelationType::Competition,
                    1.0,
                ));
            }
        }
        build_graph(nodes, edges)
    }

    #[test]
    fn test_star_targeted_attack() {
        let g = star(9);
        let result = analyze_robustness(&g, None);
        assert!((result.targeted_attack.threshold - 0.1).abs() < 1e-12);
        assert_eq!(result.targeted_attack.curve.len(), 2);
        assert!(result.random_attack.threshold >= result.targeted_attack.threshold);
        assert_eq!(result.critical_nodes[0].id, "hub");
    }

    #[test]
    fn test_random_attack_curve_shape() {
        let result = analyze_robustness(&complete(6), None);
        let curve = &result.random_attack.curve;
        assert_eq!(curve.len(), 19);
        assert_eq!(curve[0].removed_count, 0);
        assert!((curve[18].removed_fraction - 0.9).abs() < 1e-9);
        assert_eq!(curve[18].removed_count, 5);
        // A complete graph never fragments
        assert!((result.random_attack.threshold - 0.9).abs() < 1e-12);
        assert!((result.targeted_attack.threshold - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_fraction_step_terminates() {
        let config = RobustnessConfig {
            fraction_step: 0.0,
            ..RobustnessConfig::default()
        };
        let result = analyze_robustness_with(&star(9), None, None, &config);
        assert_eq!(result.random_attack.curve.len(), 1);
        assert_eq!(result.random_attack.curve[0].removed_count, 0);
        assert!((result.random_attack.threshold - 0.9).abs() < 1e-12);
        assert!((result.targeted_attack.threshold - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_random_attack_is_seeded() {
        let g = star(15);
        let a = analyze_robustness(&g, None);
        let b = analyze_robustness(&g, None);
        assert_eq!(a.random_attack, b.random_attack);
    }

    #[test]
    fn test_vulnerability_with_centrality() {
        let g = star(4);
        let centrality = analyze_centrality(&g);
        let result = analyze_robustness(&g, Some(&centrality));
        let expected = 0.3 * centrality.score(CentralityMeasure::Betweenness, "hub").unwrap()
            + 0.3 * centrality.score(CentralityMeasure::Degree, "hub").unwrap()
            + 0.2 * centrality.score(CentralityMeasure::PageRank, "hub").unwrap()
            + 0.2 * centrality.score(CentralityMeasure::Closeness, "hub").unwrap();
        assert!((result.vulnerability["hub"] - expected).abs() < 1e-12);
        assert!(result.failure_probability.values().all(|&p| p <= 0.9));
    }

    #[test]
    fn test_resilience_and_systemic_risk() {
        let result = analyze_robustness(&complete(4), None);
        assert!((result.resilience.connectivity - 0.5).abs() < 1e-12);
        assert!((result.resilience.efficiency - 1.0).abs() < 1e-12);
        assert!((result.resilience.structural - 1.0).abs() < 1e-12);
        // Fewer than ten nodes: the top set holds all vulnerability
        assert!((result.systemic_risk - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_failure_probability_includes_intensity() {
        let g = star(3);
        let intensity = crate::analytics::intensity::build_intensity_model(&g);
        let result = analyze_robustness_with(&g, None, Some(&intensity), &RobustnessConfig::default());
        let expected = (0.1 * 1.0 + 0.05 * intensity.node_intensity("hub").unwrap()).min(0.9);
        assert!((result.failure_probability["hub"] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph() {
        let result = analyze_robustness(&ConflictGraph::new(), None);
        assert_eq!(result, RobustnessResult::default());
    }
}
