//! Conflict graph model.
//!
//! Holds the entity/relation records as a petgraph directed multigraph and
//! provides the algorithmic primitives shared by every analyzer.
//!
//! ## Architecture
//!
//! ```text
//! loader records ──► builder ──► ConflictGraph (petgraph::DiGraph, multigraph)
//!                                    │
//!                                to_simple ──► SimpleGraph (petgraph::UnGraph)
//!                                    │
//!                               algorithms / generators
//! ```
//!
//! ## Modules
//!
//! - [`models`] — Entity, Relation, ConflictGraph, SimpleGraph
//! - [`builder`] — record validation, build report, fingerprint
//! - [`algorithms`] — BFS, components, clustering, centralities, Louvain
//! - [`generators`] — Erdős–Rényi and ring-lattice baselines

pub mod algorithms;
pub mod builder;
pub mod generators;
pub mod models;

pub use builder::{build_graph, build_graph_with, fingerprint, BuildConfig, BuildReport, GraphBuilder};
pub use models::{
    ConflictGraph, Entity, EntityType, Importance, RejectedRelation, Relation, RelationType,
    SimpleEdge, SimpleGraph,
};

/// Collapse a graph into its undirected simple projection.
pub fn to_simple_undirected(graph: &ConflictGraph) -> SimpleGraph {
    SimpleGraph::from_conflict_graph(graph)
}
