//! Conflict graph data models.
//!
//! ## Input types
//! - [`EntityType`] / [`Importance`] / [`Entity`] — nodes of the conflict network
//! - [`RelationType`] / [`Relation`] — typed, weighted relations between entities
//!
//! ## Graph types
//! - [`ConflictGraph`] — directed multigraph with ID ↔ NodeIndex mapping and an
//!   ordered edge list per `(source, target)` pair
//! - [`SimpleGraph`] — undirected simple projection used by most metrics

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use crate::error::GraphError;

// ============================================================================
// Tags
// ============================================================================

/// Kind of entity taking part in the conflict network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Resource,
    Role,
    Institution,
    Actor,
    Process,
    Other,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resource => write!(f, "resource"),
            Self::Role => write!(f, "role"),
            Self::Institution => write!(f, "institution"),
            Self::Actor => write!(f, "actor"),
            Self::Process => write!(f, "process"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl FromStr for EntityType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resource" => Ok(Self::Resource),
            "role" => Ok(Self::Role),
            "institution" => Ok(Self::Institution),
            "actor" => Ok(Self::Actor),
            "process" => Ok(Self::Process),
            "other" => Ok(Self::Other),
            _ => Err(GraphError::UnknownTag {
                kind: "entity type",
                value: s.to_string(),
            }),
        }
    }
}

/// Ordinal importance of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Importance {
    fn default() -> Self {
        Self::Medium
    }
}

impl Importance {
    /// Numeric weight used by the intensity model.
    pub fn weight(self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Medium => 1.0,
            Self::High => 1.5,
            Self::Critical => 2.0,
        }
    }
}

impl FromStr for Importance {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(GraphError::UnknownTag {
                kind: "importance",
                value: s.to_string(),
            }),
        }
    }
}

/// Type of relation between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Opposition,
    Competition,
    Constraint,
    Dependency,
    Cooperation,
    Other,
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opposition => write!(f, "opposition"),
            Self::Competition => write!(f, "competition"),
            Self::Constraint => write!(f, "constraint"),
            Self::Dependency => write!(f, "dependency"),
            Self::Cooperation => write!(f, "cooperation"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl FromStr for RelationType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opposition" => Ok(Self::Opposition),
            "competition" => Ok(Self::Competition),
            "constraint" => Ok(Self::Constraint),
            "dependency" => Ok(Self::Dependency),
            "cooperation" => Ok(Self::Cooperation),
            "other" => Ok(Self::Other),
            _ => Err(GraphError::UnknownTag {
                kind: "relation type",
                value: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// An entity (node) of the conflict network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Kind of entity
    pub entity_type: EntityType,
    /// Thematic domains this entity belongs to
    #[serde(default)]
    pub domains: BTreeSet<String>,
    #[serde(default)]
    pub importance: Importance,
    /// Free-form attributes carried through from the loader
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Entity {
    /// Convenience constructor with medium importance and no attributes.
    pub fn new(id: &str, entity_type: EntityType, domains: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            entity_type,
            domains: domains.iter().map(|d| d.to_string()).collect(),
            importance: Importance::Medium,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Whether the two entities share at least one domain tag. An entity
    /// without tags shares none.
    pub fn shares_domain(&self, other: &Entity) -> bool {
        !self.domains.is_disjoint(&other.domains)
    }
}

fn default_half() -> f64 {
    0.5
}

fn default_one() -> f64 {
    1.0
}

/// A directed, typed relation between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub relation_type: RelationType,
    /// Relation strength in [0, 1]
    pub strength: f64,
    /// Whether the relation was flagged as crossing domains by the loader
    #[serde(default)]
    pub cross_domain: bool,
    /// Confidence in the relation in [0, 1]
    #[serde(default = "default_one")]
    pub confidence: f64,
    /// Day-to-day friction along the relation in [0, 1]
    #[serde(default = "default_half")]
    pub friction: f64,
    /// Likelihood the relation escalates, in [0, 1]
    #[serde(default = "default_half")]
    pub escalation_potential: f64,
}

impl Relation {
    /// Convenience constructor: full confidence, neutral friction/escalation.
    pub fn new(source: &str, target: &str, relation_type: RelationType, strength: f64) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            relation_type,
            strength,
            cross_domain: false,
            confidence: 1.0,
            friction: 0.5,
            escalation_potential: 0.5,
        }
    }
}

// ============================================================================
// ConflictGraph — directed multigraph
// ============================================================================

/// Why a relation was not added to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectedRelation {
    /// The named endpoint does not exist
    MissingEndpoint(String),
    /// A relation with the same `(source, target, relation_type)` already exists
    Duplicate,
}

/// Directed multigraph over [`Entity`] / [`Relation`].
///
/// Each `(source, target)` pair owns an insertion-ordered list of edges, at
/// most one per relation type. Nothing here collapses parallel edges; see
/// [`SimpleGraph`] for the explicit reductions.
#[derive(Debug, Clone)]
pub struct ConflictGraph {
    /// The underlying directed graph
    pub graph: DiGraph<Entity, Relation>,
    /// Mapping from entity ID to petgraph NodeIndex
    pub id_to_index: HashMap<String, NodeIndex>,
    pair_edges: HashMap<(NodeIndex, NodeIndex), Vec<EdgeIndex>>,
}

impl ConflictGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_to_index: HashMap::new(),
            pair_edges: HashMap::new(),
        }
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(nodes, edges),
            id_to_index: HashMap::with_capacity(nodes),
            pair_edges: HashMap::with_capacity(edges),
        }
    }

    /// Add an entity. Returns `None` if an entity with the same ID exists.
    pub fn add_node(&mut self, entity: Entity) -> Option<NodeIndex> {
        if self.id_to_index.contains_key(&entity.id) {
            return None;
        }
        let id = entity.id.clone();
        let idx = self.graph.add_node(entity);
        self.id_to_index.insert(id, idx);
        Some(idx)
    }

    /// Add a relation between two existing entities.
    pub fn add_relation(&mut self, relation: Relation) -> Result<EdgeIndex, RejectedRelation> {
        let from = self
            .get_index(&relation.source)
            .ok_or_else(|| RejectedRelation::MissingEndpoint(relation.source.clone()))?;
        let to = self
            .get_index(&relation.target)
            .ok_or_else(|| RejectedRelation::MissingEndpoint(relation.target.clone()))?;

        if self
            .relation_of_type(from, to, relation.relation_type)
            .is_some()
        {
            return Err(RejectedRelation::Duplicate);
        }

        let edge = self.graph.add_edge(from, to, relation);
        self.pair_edges.entry((from, to)).or_default().push(edge);
        Ok(edge)
    }

    pub fn get_node(&self, id: &str) -> Option<&Entity> {
        let idx = self.id_to_index.get(id)?;
        self.graph.node_weight(*idx)
    }

    pub fn get_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    /// Entity ID at a given index.
    pub fn node_id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].id
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of directed relations (parallel edges counted separately).
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Relations from `source` to `target`, in insertion order.
    pub fn relations_between(
        &self,
        source: NodeIndex,
        target: NodeIndex,
    ) -> impl Iterator<Item = &Relation> + '_ {
        self.pair_edges
            .get(&(source, target))
            .into_iter()
            .flatten()
            .map(move |&e| &self.graph[e])
    }

    /// The relation of a given type from `source` to `target`, if any.
    pub fn relation_of_type(
        &self,
        source: NodeIndex,
        target: NodeIndex,
        relation_type: RelationType,
    ) -> Option<&Relation> {
        self.relations_between(source, target)
            .find(|r| r.relation_type == relation_type)
    }

    /// Outgoing relations of a node (one entry per parallel edge).
    pub fn outgoing(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &Relation)> + '_ {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
    }

    /// Incoming relations of a node (one entry per parallel edge).
    pub fn incoming(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &Relation)> + '_ {
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
    }

    /// All domain tags present in the graph, sorted.
    pub fn domains(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .graph
            .node_weights()
            .flat_map(|e| e.domains.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Collapse into the undirected simple projection.
    pub fn to_simple(&self) -> SimpleGraph {
        SimpleGraph::from_conflict_graph(self)
    }
}

impl Default for ConflictGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SimpleGraph — undirected simple projection
// ============================================================================

/// Reduction of every relation between an unordered pair of entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimpleEdge {
    /// Maximum strength over all relations in either direction
    pub max_strength: f64,
    /// Maximum friction over all relations in either direction
    pub max_friction: f64,
    /// Number of relations collapsed into this edge
    pub multiplicity: usize,
}

impl SimpleEdge {
    fn from_relation(relation: &Relation) -> Self {
        Self {
            max_strength: relation.strength,
            max_friction: relation.friction,
            multiplicity: 1,
        }
    }

    /// Fold another relation of the same pair into this edge.
    fn absorb(&mut self, relation: &Relation) {
        self.max_strength = self.max_strength.max(relation.strength);
        self.max_friction = self.max_friction.max(relation.friction);
        self.multiplicity += 1;
    }
}

/// Undirected simple graph sharing node indices with its [`ConflictGraph`].
#[derive(Debug, Clone)]
pub struct SimpleGraph {
    /// Node weights are entity IDs
    pub graph: UnGraph<String, SimpleEdge>,
    /// Sorted neighbor lists by node position
    pub adjacency: Vec<Vec<usize>>,
}

impl SimpleGraph {
    pub fn from_conflict_graph(conflict: &ConflictGraph) -> Self {
        let g = &conflict.graph;
        let n = g.node_count();
        let mut graph: UnGraph<String, SimpleEdge> = UnGraph::with_capacity(n, g.edge_count());
        for idx in g.node_indices() {
            graph.add_node(g[idx].id.clone());
        }

        let mut pair_to_edge: HashMap<(usize, usize), EdgeIndex> = HashMap::new();
        for edge in g.edge_references() {
            let (s, t) = (edge.source().index(), edge.target().index());
            if s == t {
                continue;
            }
            let key = (s.min(t), s.max(t));
            match pair_to_edge.get(&key) {
                Some(&e) => graph[e].absorb(edge.weight()),
                None => {
                    let e = graph.add_edge(
                        NodeIndex::new(key.0),
                        NodeIndex::new(key.1),
                        SimpleEdge::from_relation(edge.weight()),
                    );
                    pair_to_edge.insert(key, e);
                }
            }
        }

        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in pair_to_edge.keys() {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
        for neighbors in adjacency.iter_mut() {
            neighbors.sort_unstable();
        }

        Self { graph, adjacency }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    pub fn node_id(&self, node: usize) -> &str {
        &self.graph[NodeIndex::new(node)]
    }

    /// The collapsed edge between two nodes, if any.
    pub fn edge(&self, a: usize, b: usize) -> Option<&SimpleEdge> {
        self.graph
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .map(|e| &self.graph[e])
    }

    /// Undirected edges as `(a, b)` with `a < b`, sorted.
    pub fn edge_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = self
            .graph
            .edge_references()
            .map(|e| {
                let (s, t) = (e.source().index(), e.target().index());
                (s.min(t), s.max(t))
            })
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Density `|E| / (n(n-1)/2)`, 0 for fewer than two nodes.
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        let possible = (n * (n - 1)) as f64 / 2.0;
        self.edge_count() as f64 / possible
    }
}

// ============================================================================
// Tests
// ============================================================================
