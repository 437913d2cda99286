//! Conflict network analytics.
//!
//! Each analyzer is a pure function over one immutable [`ConflictGraph`]
//! snapshot, with a `*_with` variant taking explicit configuration.
//!
//! ## Pipeline
//!
//! ```text
//! ConflictGraph ─► topology ─► intensity ─► community ─► centrality ─► propagation ─► robustness
//!                     │                                     ▲              ▲              ▲
//!                  cache (LRU, fingerprint)                 └── intensity ─┴── centrality ┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] — `AnalysisConfig` sections, YAML + env loading
//! - [`topology`] — degree, components, paths, clustering, small-world
//! - [`intensity`] — edge/node conflict intensity and predictor
//! - [`community`] / [`spectral`] — Louvain → spectral → single community
//! - [`centrality`] — ten centrality measures, rankings, critical sets
//! - [`propagation`] — Monte-Carlo cascades and S/I/R forecasts
//! - [`robustness`] — random/targeted attacks, vulnerability, systemic risk
//! - [`engine`] / [`cache`] — orchestrator and its topology cache
//! - [`outcome`] — fallback chains and method reports
//!
//! [`ConflictGraph`]: crate::graph::ConflictGraph

pub mod cache;
pub mod centrality;
pub mod community;
pub mod config;
pub mod engine;
pub mod intensity;
pub mod outcome;
pub mod propagation;
pub mod robustness;
pub mod spectral;
pub mod stats;
pub mod topology;

pub use cache::{AnalysisCache, CacheStats};
pub use centrality::{
    analyze_centrality, analyze_centrality_with, CentralityMeasure, CentralityResult,
    CriticalNodes, RankedNode,
};
pub use community::{
    discover_communities, discover_communities_with, Community, CommunityStructure, DomainMixing,
};
pub use config::{
    AnalysisConfig, CentralityConfig, CommunityConfig, IntensityConfig, IntensityWeights,
    PropagationConfig, RelationWeightTable, RobustnessConfig, TopologyConfig,
};
pub use engine::{run_full_analysis, AnalysisOrchestrator, FullAnalysis, StepFailure};
pub use intensity::{
    build_intensity_model, build_intensity_model_with, EdgeIntensity, IntensityDistribution,
    IntensityModel, IntensityPredictor,
};
pub use outcome::{FailedAttempt, FallbackChain, MethodReport, Resolved};
pub use propagation::{
    simulate_propagation, simulate_propagation_with, CascadeDistribution, Forecast,
    PropagationModel,
};
pub use robustness::{
    analyze_robustness, analyze_robustness_with, AttackPoint, AttackResult, NodeVulnerability,
    ResilienceMetrics, RobustnessResult,
};
pub use topology::{analyze_topology, analyze_topology_with, PathMetrics, SmallWorld, TopologyMetrics};
