//! Full-pipeline orchestration.
//!
//! Runs every analyzer over one graph snapshot in dependency order. Each step
//! is isolated: a panic inside an analyzer is caught, logged and recorded as a
//! [`StepFailure`], its section is left empty, and later steps still run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::cache::AnalysisCache;
use super::centrality::{analyze_centrality_with, CentralityMeasure, CentralityResult};
use super::community::{discover_communities_with, CommunityStructure};
use super::config::AnalysisConfig;
use super::intensity::{build_intensity_model_with, IntensityModel};
use super::propagation::{simulate_propagation_with, PropagationModel};
use super::robustness::{analyze_robustness_with, RobustnessResult};
use super::topology::TopologyMetrics;
use crate::error::GraphError;
use crate::graph::ConflictGraph;

/// An analyzer step that did not produce its section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// Aggregate result of [`AnalysisOrchestrator::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullAnalysis {
    pub node_count: usize,
    pub edge_count: usize,
    /// Content hash of the analyzed graph
    pub fingerprint: String,
    pub topology: Option<TopologyMetrics>,
    /// Whether topology came from the orchestrator cache
    pub topology_cached: bool,
    pub intensity: Option<IntensityModel>,
    pub communities: Option<CommunityStructure>,
    pub centrality: Option<CentralityResult>,
    pub propagation: Option<PropagationModel>,
    pub robustness: Option<RobustnessResult>,
    pub key_findings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StepFailure>,
    pub computation_ms: u64,
    pub computed_at: DateTime<Utc>,
}

/// Owns the configuration and the topology cache.
#[derive(Debug)]
pub struct AnalysisOrchestrator {
    config: AnalysisConfig,
    cache: AnalysisCache,
}

impl Default for AnalysisOrchestrator {
    fn default() -> Self {
        let config = AnalysisConfig::default();
        let cache = AnalysisCache::new(config.cache_capacity);
        Self { config, cache }
    }
}

impl AnalysisOrchestrator {
    /// Orchestrator over a validated configuration.
    pub fn new(config: AnalysisConfig) -> Result<Self, GraphError> {
        config.validate()?;
        let cache = AnalysisCache::new(config.cache_capacity);
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Forget cached results. Call after the graph has changed.
    pub fn invalidate_cache(&mut self) {
        debug!("Invalidating analysis cache ({} entries)", self.cache.len());
        self.cache.clear();
    }

    pub fn run(&mut self, graph: &ConflictGraph) -> FullAnalysis {
        let start = Instant::now();
        let fingerprint = graph.fingerprint();
        let config = &self.config;
        let cache = &mut self.cache;
        let mut failures = Vec::new();

        let topology = run_step(&mut failures, "topology", || {
            cache.get_or_compute_topology(graph, &fingerprint, &config.topology)
        });
        let (topology, topology_cached) = match topology {
            Some((metrics, hit)) => (Some(metrics), hit),
            None => (None, false),
        };

        let intensity = run_step(&mut failures, "intensity", || {
            build_intensity_model_with(graph, &config.intensity)
        });
        let communities = run_step(&mut failures, "communities", || {
            discover_communities_with(graph, &config.community)
        });
        let centrality = run_step(&mut failures, "centrality", || {
            analyze_centrality_with(graph, intensity.as_ref(), &config.centrality)
        });
        let propagation = run_step(&mut failures, "propagation", || {
            simulate_propagation_with(graph, intensity.as_ref(), &config.propagation)
        });
        let robustness = run_step(&mut failures, "robustness", || {
            analyze_robustness_with(
                graph,
                centrality.as_ref(),
                intensity.as_ref(),
                &config.robustness,
            )
        });

        let key_findings = key_findings(
            topology.as_ref(),
            communities.as_ref(),
            centrality.as_ref(),
            propagation.as_ref(),
            robustness.as_ref(),
        );
        let computation_ms = start.elapsed().as_millis() as u64;
        info!(
            "Analysis complete: {} nodes, {} edges, {} failed steps in {}ms",
            graph.node_count(),
            graph.edge_count(),
            failures.len(),
            computation_ms
        );

        FullAnalysis {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            fingerprint,
            topology,
            topology_cached,
            intensity,
            communities,
            centrality,
            propagation,
            robustness,
            key_findings,
            failures,
            computation_ms,
            computed_at: Utc::now(),
        }
    }
}

/// Run the whole pipeline with default configuration.
pub fn run_full_analysis(graph: &ConflictGraph) -> FullAnalysis {
    AnalysisOrchestrator::default().run(graph)
}

fn run_step<T>(failures: &mut Vec<StepFailure>, step: &str, f: impl FnOnce() -> T) -> Option<T> {
    let start = Instant::now();
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => {
            debug!("Step {} finished in {:?}", step, start.elapsed());
            Some(value)
        }
        Err(payload) => {
            let error = panic_message(payload.as_ref());
            warn!("Step {} failed: {}", step, error);
            failures.push(StepFailure {
                step: step.to_string(),
                error,
            });
            None
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn key_findings(
    topology: Option<&TopologyMetrics>,
    communities: Option<&CommunityStructure>,
    centrality: Option<&CentralityResult>,
    propagation: Option<&PropagationModel>,
    robustness: Option<&RobustnessResult>,
) -> Vec<String> {
    let mut findings = Vec::new();

    if let Some(t) = topology {
        let regime = if t.density < 0.1 {
            "Sparse"
        } else if t.density < 0.3 {
            "Moderately dense"
        } else {
            "Dense"
        };
        findings.push(format!("{} network (density {:.3})", regime, t.density));
        if t.is_connected {
            findings.push("Network is connected".to_string());
        } else if t.component_count > 1 {
            findings.push(format!(
                "Network splits into {} components (largest: {} entities)",
                t.component_count, t.largest_component_size
            ));
        }
    }

    if let Some(c) = communities {
        findings.push(format!(
            "{} communities detected via {} (modularity {:.3})",
            c.community_count, c.method.method, c.modularity
        ));
    }

    if let Some(top) = centrality.and_then(|c| c.top(CentralityMeasure::Betweenness)) {
        if top.score > 0.0 {
            findings.push(format!(
                "Most central entity: {} (betweenness {:.3})",
                top.id, top.score
            ));
        }
    }

    if let Some(p) = propagation {
        findings.push(format!(
            "Critical cascade threshold: {:.0}% of entities",
            p.critical_cascade_threshold * 100.0
        ));
    }

    if let Some(r) = robustness {
        let level = if r.systemic_risk >= 0.7 {
            "high"
        } else if r.systemic_risk >= 0.4 {
            "moderate"
        } else {
            "low"
        };
        findings.push(format!("Systemic risk {:.2} ({})", r.systemic_risk, level));
    }

    findings
}
