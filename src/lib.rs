//! Conflict Analytics
//!
//! Network analysis of multi-relational conflict graphs:
//! - Directed multigraph model over petgraph, with an explicit simple projection
//! - Topology statistics, including small-world indices against seeded baselines
//! - Synthesized conflict intensity per relation and entity
//! - Community detection (Louvain, spectral fallback) and domain mixing
//! - Ten centrality measures with observable fallbacks
//! - Monte-Carlo cascades and S/I/R propagation forecasts
//! - Random and targeted attack robustness, vulnerability and systemic risk
//!
//! ```no_run
//! use conflict_analytics::{build_graph, run_full_analysis, Entity, EntityType, Relation, RelationType};
//!
//! let graph = build_graph(
//!     vec![
//!         Entity::new("north_council", EntityType::Institution, &["north"]),
//!         Entity::new("river_guild", EntityType::Actor, &["south"]),
//!     ],
//!     vec![Relation::new("north_council", "river_guild", RelationType::Opposition, 0.8)],
//! );
//! let analysis = run_full_analysis(&graph);
//! println!("{}", analysis.key_findings.join("\n"));
//! ```

pub mod analytics;
pub mod error;
pub mod graph;

pub use analytics::{
    analyze_centrality, analyze_robustness, analyze_topology, build_intensity_model,
    discover_communities, run_full_analysis, simulate_propagation, AnalysisConfig,
    AnalysisOrchestrator, CentralityMeasure, CentralityResult, CommunityStructure, FullAnalysis,
    IntensityModel, MethodReport, PropagationModel, RobustnessResult, TopologyMetrics,
};
pub use error::{AlgorithmError, GraphError};
pub use graph::{
    build_graph, build_graph_with, BuildConfig, BuildReport, ConflictGraph, Entity, EntityType,
    GraphBuilder, Importance, Relation, RelationType, SimpleGraph,
};

use serde::{Deserialize, Serialize};

/// Raw node and edge records, as produced by a loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphInput {
    #[serde(default)]
    pub nodes: Vec<Entity>,
    #[serde(default)]
    pub edges: Vec<Relation>,
}

impl GraphInput {
    /// Build the graph under the configured size limits.
    pub fn build(self, config: &BuildConfig) -> Result<(ConflictGraph, BuildReport), GraphError> {
        build_graph_with(self.nodes, self.edges, config)
    }
}
