//! Synthesized conflict intensity per relation and per entity.
//!
//! Edge intensity combines the relation's own attributes with the configured
//! relation-type weight; node intensity aggregates the edges touching a node,
//! scaled by the entity's importance.

use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::config::IntensityConfig;
use super::outcome::{FallbackChain, MethodReport};
use super::stats;
use crate::error::AlgorithmError;
use crate::graph::{ConflictGraph, Entity, Relation, RelationType};

/// Percentiles reported in [`IntensityDistribution::percentiles`].
pub const REPORTED_PERCENTILES: [u32; 7] = [10, 25, 50, 75, 90, 95, 99];

const PREDICTOR_RIDGE: f64 = 1e-9;
const ACCURACY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeIntensity {
    pub source: String,
    pub target: String,
    pub relation_type: RelationType,
    pub intensity: f64,
}

/// Summary statistics over edge and node intensities combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntensityDistribution {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Keyed by percentile in 0..=100
    pub percentiles: BTreeMap<u32, f64>,
}

/// Least-squares coefficients of the edge intensity predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorCoefficients {
    pub intercept: f64,
    pub source_importance: f64,
    pub target_importance: f64,
    pub source_domains: f64,
    pub target_domains: f64,
    pub shared_domain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityPredictor {
    pub coefficients: PredictorCoefficients,
    /// `1 - mean(|actual - predicted| / (actual + ε))` on the training edges
    pub accuracy: f64,
    pub samples: usize,
}

impl IntensityPredictor {
    /// Predicted intensity of a relation between two entities.
    pub fn predict(&self, source: &Entity, target: &Entity) -> f64 {
        let c = &self.coefficients;
        let x = features(source, target);
        c.intercept
            + c.source_importance * x[1]
            + c.target_importance * x[2]
            + c.source_domains * x[3]
            + c.target_domains * x[4]
            + c.shared_domain * x[5]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityModel {
    /// One entry per directed relation, in graph edge order
    pub edge_intensities: Vec<EdgeIntensity>,
    pub node_intensities: BTreeMap<String, f64>,
    pub distribution: IntensityDistribution,
    /// 75th percentile of the combined distribution
    pub escalation_threshold: f64,
    /// Relations whose intensity exceeds the escalation threshold
    pub escalating_edges: Vec<EdgeIntensity>,
    pub predictor: Option<IntensityPredictor>,
    /// How the predictor was obtained, or why it is absent
    pub predictor_method: MethodReport,
}

impl IntensityModel {
    pub fn node_intensity(&self, id: &str) -> Option<f64> {
        self.node_intensities.get(id).copied()
    }

    /// Mean intensity over relations (0 without relations).
    pub fn mean_edge_intensity(&self) -> f64 {
        let values: Vec<f64> = self.edge_intensities.iter().map(|e| e.intensity).collect();
        stats::mean(&values)
    }

    /// Node intensities aligned with node positions of `graph`.
    pub fn node_vector(&self, graph: &ConflictGraph) -> Vec<f64> {
        graph
            .graph
            .node_weights()
            .map(|e| self.node_intensity(&e.id).unwrap_or(0.0))
            .collect()
    }
}

/// Intensity of a single relation.
pub fn edge_intensity(relation: &Relation, config: &IntensityConfig) -> f64 {
    let w = &config.weights;
    let cross_domain_factor = if relation.cross_domain {
        config.cross_domain_factor
    } else {
        1.0
    };
    let relation_weight = config.relation_weights.weight(relation.relation_type);
    relation.confidence
        * (w.strength * relation.strength
            + w.friction * relation.friction
            + w.escalation * relation.escalation_potential
            + w.cross_domain * cross_domain_factor
            + w.relation_type * relation_weight)
}

/// Build the intensity model with default configuration.
pub fn build_intensity_model(graph: &ConflictGraph) -> IntensityModel {
    build_intensity_model_with(graph, &IntensityConfig::default())
}

pub fn build_intensity_model_with(graph: &ConflictGraph, config: &IntensityConfig) -> IntensityModel {
    let g = &graph.graph;

    let mut edge_intensities = Vec::with_capacity(g.edge_count());
    let mut node_sums = vec![0.0; g.node_count()];
    for edge in g.edge_references() {
        let relation = edge.weight();
        let intensity = edge_intensity(relation, config);
        node_sums[edge.source().index()] += intensity;
        node_sums[edge.target().index()] += intensity;
        edge_intensities.push(EdgeIntensity {
            source: relation.source.clone(),
            target: relation.target.clone(),
            relation_type: relation.relation_type,
            intensity,
        });
    }

    let node_intensities: BTreeMap<String, f64> = g
        .node_indices()
        .map(|idx| {
            let entity = &g[idx];
            let value = entity.importance.weight() * node_sums[idx.index()] / 2.0;
            (entity.id.clone(), value)
        })
        .collect();

    let combined: Vec<f64> = edge_intensities
        .iter()
        .map(|e| e.intensity)
        .chain(node_intensities.values().copied())
        .collect();
    let distribution = distribution(&combined);
    let escalation_threshold = distribution.percentiles.get(&75).copied().unwrap_or(0.0);
    let escalating_edges: Vec<EdgeIntensity> = edge_intensities
        .iter()
        .filter(|e| e.intensity > escalation_threshold)
        .cloned()
        .collect();

    let resolved = FallbackChain::new()
        .attempt("least_squares", || {
            fit_predictor(graph, &edge_intensities, config.predictor_min_samples).map(Some)
        })
        .or_else("none", || None);

    debug!(
        "Intensity model: {} edges, {} escalating, predictor via {}",
        edge_intensities.len(),
        escalating_edges.len(),
        resolved.report.method
    );

    IntensityModel {
        edge_intensities,
        node_intensities,
        distribution,
        escalation_threshold,
        escalating_edges,
        predictor: resolved.value,
        predictor_method: resolved.report,
    }
}

fn distribution(values: &[f64]) -> IntensityDistribution {
    if values.is_empty() {
        return IntensityDistribution::default();
    }
    let sorted = stats::sorted(values);
    IntensityDistribution {
        mean: stats::mean(values),
        std: stats::std_dev(values),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: stats::median(values),
        percentiles: REPORTED_PERCENTILES
            .iter()
            .map(|&p| (p, stats::percentile_sorted(&sorted, p as f64)))
            .collect(),
    }
}

/// `[1, imp_s, imp_t, domains_s, domains_t, shared]`
fn features(source: &Entity, target: &Entity) -> [f64; 6] {
    let shared = if source.domains.intersection(&target.domains).next().is_some() {
        1.0
    } else {
        0.0
    };
    [
        1.0,
        source.importance.weight(),
        target.importance.weight(),
        source.domains.len() as f64,
        target.domains.len() as f64,
        shared,
    ]
}

fn fit_predictor(
    graph: &ConflictGraph,
    edges: &[EdgeIntensity],
    min_samples: usize,
) -> Result<IntensityPredictor, AlgorithmError> {
    if edges.len() < min_samples.max(1) {
        return Err(AlgorithmError::degenerate(
            "least_squares",
            format!("{} samples, need {}", edges.len(), min_samples),
        ));
    }

    let mut x = Vec::with_capacity(edges.len());
    let mut y = Vec::with_capacity(edges.len());
    for edge in edges {
        let (Some(source), Some(target)) = (graph.get_node(&edge.source), graph.get_node(&edge.target))
        else {
            continue;
        };
        x.push(features(source, target).to_vec());
        y.push(edge.intensity);
    }

    let beta = stats::least_squares(&x, &y, PREDICTOR_RIDGE)
        .ok_or_else(|| AlgorithmError::degenerate("least_squares", "singular design matrix"))?;

    let errors: Vec<f64> = x
        .iter()
        .zip(&y)
        .map(|(row, &actual)| {
            let predicted: f64 = row.iter().zip(&beta).map(|(a, b)| a * b).sum();
            (actual - predicted).abs() / (actual + ACCURACY_EPSILON)
        })
        .collect();

    Ok(IntensityPredictor {
        coefficients: PredictorCoefficients {
            intercept: beta[0],
            source_importance: beta[1],
            target_importance: beta[2],
            source_domains: beta[3],
            target_domains: beta[4],
            shared_domain: beta[5],
        },
        accuracy: 1.0 - stats::mean(&errors),
        samples: y.len(),
    })
}
