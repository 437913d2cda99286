//! Record → petgraph construction.
//!
//! Converts the in-memory entity and relation records produced by a loader
//! into a [`ConflictGraph`]. Problems with individual records never abort the
//! build: the offending record is dropped (or its out-of-range fields clamped)
//! and a warning is logged. The [`BuildReport`] tells the caller what happened.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::models::{ConflictGraph, Entity, RejectedRelation, Relation};
use crate::error::GraphError;

/// Size limits applied by [`build_graph_with`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Reject inputs with more entities than this
    pub max_nodes: Option<usize>,
    /// Reject inputs with more relations than this
    pub max_edges: Option<usize>,
}

/// What the builder accepted and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub nodes_added: usize,
    pub duplicate_nodes: usize,
    pub edges_added: usize,
    pub missing_endpoint_edges: usize,
    pub duplicate_edges: usize,
    pub invalid_edges: usize,
    pub clamped_fields: usize,
}

impl BuildReport {
    pub fn dropped_edges(&self) -> usize {
        self.missing_endpoint_edges + self.duplicate_edges + self.invalid_edges
    }
}

/// Incremental graph builder that records what it dropped.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: ConflictGraph,
    report: BuildReport,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: ConflictGraph::with_capacity(nodes, edges),
            report: BuildReport::default(),
        }
    }

    pub fn add_entity(&mut self, entity: Entity) -> &mut Self {
        let id = entity.id.clone();
        match self.graph.add_node(entity) {
            Some(_) => self.report.nodes_added += 1,
            None => {
                warn!("Dropping duplicate entity '{}'", id);
                self.report.duplicate_nodes += 1;
            }
        }
        self
    }

    pub fn add_relation(&mut self, mut relation: Relation) -> &mut Self {
        let numeric = [
            relation.strength,
            relation.confidence,
            relation.friction,
            relation.escalation_potential,
        ];
        if numeric.iter().any(|v| !v.is_finite()) {
            warn!(
                "Dropping relation {} -> {} ({}): non-finite numeric field",
                relation.source, relation.target, relation.relation_type
            );
            self.report.invalid_edges += 1;
            return self;
        }

        for field in [
            &mut relation.strength,
            &mut relation.confidence,
            &mut relation.friction,
            &mut relation.escalation_potential,
        ] {
            if !(0.0..=1.0).contains(&*field) {
                *field = field.clamp(0.0, 1.0);
                self.report.clamped_fields += 1;
            }
        }

        let (source, target, kind) = (
            relation.source.clone(),
            relation.target.clone(),
            relation.relation_type,
        );
        match self.graph.add_relation(relation) {
            Ok(_) => self.report.edges_added += 1,
            Err(RejectedRelation::MissingEndpoint(missing)) => {
                warn!(
                    "Dropping relation {} -> {} ({}): unknown endpoint '{}'",
                    source, target, kind, missing
                );
                self.report.missing_endpoint_edges += 1;
            }
            Err(RejectedRelation::Duplicate) => {
                warn!(
                    "Dropping duplicate relation {} -> {} ({})",
                    source, target, kind
                );
                self.report.duplicate_edges += 1;
            }
        }
        self
    }

    /// Builder with every record already added, entities first.
    pub fn from_records(nodes: Vec<Entity>, edges: Vec<Relation>) -> Self {
        let mut builder = Self::with_capacity(nodes.len(), edges.len());
        for node in nodes {
            builder.add_entity(node);
        }
        for edge in edges {
            builder.add_relation(edge);
        }
        builder
    }

    pub fn finish(self) -> (ConflictGraph, BuildReport) {
        if self.report.clamped_fields > 0 {
            warn!(
                "Clamped {} out-of-range relation fields into [0, 1]",
                self.report.clamped_fields
            );
        }
        debug!(
            "Built conflict graph: {} nodes, {} edges ({} edges dropped)",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.report.dropped_edges()
        );
        (self.graph, self.report)
    }
}

/// Build a graph from entity and relation records.
///
/// Relations referencing unknown entities are dropped with a warning.
pub fn build_graph(nodes: Vec<Entity>, edges: Vec<Relation>) -> ConflictGraph {
    GraphBuilder::from_records(nodes, edges).finish().0
}

/// Like [`build_graph`], but rejects inputs beyond the configured size limits.
pub fn build_graph_with(
    nodes: Vec<Entity>,
    edges: Vec<Relation>,
    config: &BuildConfig,
) -> Result<(ConflictGraph, BuildReport), GraphError> {
    if let Some(limit) = config.max_nodes {
        if nodes.len() > limit {
            return Err(GraphError::LimitExceeded {
                what: "node",
                limit,
                actual: nodes.len(),
            });
        }
    }
    if let Some(limit) = config.max_edges {
        if edges.len() > limit {
            return Err(GraphError::LimitExceeded {
                what: "edge",
                limit,
                actual: edges.len(),
            });
        }
    }

    Ok(GraphBuilder::from_records(nodes, edges).finish())
}

/// Stable content hash of a graph: identical node and edge sets produce the
/// same digest regardless of insertion order.
pub fn fingerprint(graph: &ConflictGraph) -> String {
    let g = &graph.graph;

    let mut nodes: Vec<String> = g
        .node_weights()
        .map(|e| {
            let mut key = String::new();
            push_field(&mut key, &e.id);
            push_field(&mut key, &e.name);
            push_field(&mut key, &e.entity_type.to_string());
            push_field(&mut key, &format!("{:?}", e.importance));
            key.push_str(&format!("{}#", e.domains.len()));
            for domain in &e.domains {
                push_field(&mut key, domain);
            }
            key
        })
        .collect();
    nodes.sort();

    let mut edges: Vec<String> = g
        .edge_weights()
        .map(|r| {
            let mut key = String::new();
            push_field(&mut key, &r.source);
            push_field(&mut key, &r.target);
            format!(
                "{}{}|{:016x}|{}|{:016x}|{:016x}|{:016x}",
                key,
                r.relation_type,
                r.strength.to_bits(),
                r.cross_domain,
                r.confidence.to_bits(),
                r.friction.to_bits(),
                r.escalation_potential.to_bits()
            )
        })
        .collect();
    edges.sort();

    let mut hasher = Sha256::new();
    hasher.update(b"nodes:");
    for node in &nodes {
        hasher.update(node.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"edges:");
    for edge in &edges {
        hasher.update(edge.as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

/// Append a length-prefixed field so separators inside values stay unambiguous.
fn push_field(key: &mut String, value: &str) {
    key.push_str(&value.len().to_string());
    key.push(':');
    key.push_str(value);
}

impl ConflictGraph {
    /// See [`fingerprint`].
    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
