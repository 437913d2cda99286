//! Configuration for the analytics pipeline.
//!
//! Every section has defaults and can be overridden from YAML. All heuristic
//! constants (intensity coefficients, relation weights, attack steps) live here
//! rather than in the analyzers.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::GraphError;
use crate::graph::{BuildConfig, RelationType};

/// Environment variable overriding every RNG seed.
pub const SEED_ENV: &str = "CONFLICT_ANALYTICS_SEED";
/// Environment variable overriding the Monte-Carlo trial count.
pub const TRIALS_ENV: &str = "CONFLICT_ANALYTICS_TRIALS";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub build: BuildConfig,
    pub topology: TopologyConfig,
    pub intensity: IntensityConfig,
    pub community: CommunityConfig,
    pub centrality: CentralityConfig,
    pub propagation: PropagationConfig,
    pub robustness: RobustnessConfig,
    /// Number of graph snapshots whose topology the orchestrator cache retains
    pub cache_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            topology: TopologyConfig::default(),
            intensity: IntensityConfig::default(),
            community: CommunityConfig::default(),
            centrality: CentralityConfig::default(),
            propagation: PropagationConfig::default(),
            robustness: RobustnessConfig::default(),
            cache_capacity: 16,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from an optional YAML file, then apply env overrides.
    ///
    /// Priority: env var > YAML > default. A missing file yields defaults; an
    /// unparsable one is logged and ignored.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self, GraphError> {
        let mut config = match yaml_path {
            Some(path) => Self::load_yaml(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn load_yaml(path: &Path) -> Result<Self, GraphError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Ok(Self::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(GraphError::ConfigIo {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn apply_env(&mut self) {
        if let Some(seed) = std::env::var(SEED_ENV).ok().and_then(|s| s.parse().ok()) {
            self.set_seed(seed);
        }
        if let Some(trials) = std::env::var(TRIALS_ENV).ok().and_then(|s| s.parse().ok()) {
            self.propagation.trials = trials;
        }
    }

    /// Use one seed for every randomized step.
    pub fn set_seed(&mut self, seed: u64) {
        self.topology.seed = seed;
        self.community.seed = seed;
        self.propagation.seed = seed;
        self.robustness.seed = seed;
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        self.intensity.validate()?;
        let c = &self.centrality;
        if !(0.0..1.0).contains(&c.pagerank_damping) {
            return Err(invalid("centrality.pagerank_damping must be in [0, 1)"));
        }
        if c.max_iterations == 0 || c.tolerance <= 0.0 {
            return Err(invalid("centrality iterations and tolerance must be positive"));
        }
        let p = &self.propagation;
        for (name, v) in [
            ("recovery_rate", p.recovery_rate),
            ("spontaneous_rate", p.spontaneous_rate),
            ("default_transmission_rate", p.default_transmission_rate),
            ("min_transmission_rate", p.min_transmission_rate),
            ("max_transmission_rate", p.max_transmission_rate),
            ("reverse_influence", p.reverse_influence),
            ("initial_infection", p.initial_infection),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(&format!("propagation.{} must be in [0, 1]", name)));
            }
        }
        if p.min_transmission_rate > p.max_transmission_rate {
            return Err(invalid("propagation transmission bounds are inverted"));
        }
        let r = &self.robustness;
        if r.fraction_step <= 0.0 || !(0.0..1.0).contains(&r.max_fraction) {
            return Err(invalid("robustness fractions must satisfy step > 0, max in [0, 1)"));
        }
        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> GraphError {
    GraphError::InvalidConfig(message.to_string())
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Seed for the random and lattice baselines
    pub seed: u64,
    /// Small-world indices are only computed from this many nodes up
    pub small_world_min_nodes: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            small_world_min_nodes: 10,
        }
    }
}

/// Coefficients of the edge intensity formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityWeights {
    pub strength: f64,
    pub friction: f64,
    pub escalation: f64,
    pub cross_domain: f64,
    pub relation_type: f64,
}

impl Default for IntensityWeights {
    fn default() -> Self {
        Self {
            strength: 0.30,
            friction: 0.25,
            escalation: 0.25,
            cross_domain: 0.10,
            relation_type: 0.10,
        }
    }
}

/// Numeric weight per relation type, with an explicit default for types
/// missing from the table.
///
/// Weights read from YAML are merged over the built-in table, so overriding
/// one relation type keeps the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationWeightTable {
    #[serde(deserialize_with = "merge_over_default_weights")]
    pub weights: BTreeMap<RelationType, f64>,
    pub default: f64,
}

impl Default for RelationWeightTable {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (RelationType::Opposition, 2.0),
            (RelationType::Competition, 1.5),
            (RelationType::Constraint, 1.3),
            (RelationType::Dependency, 0.8),
            (RelationType::Cooperation, 0.5),
        ]);
        Self {
            weights,
            default: 1.0,
        }
    }
}

fn merge_over_default_weights<'de, D>(deserializer: D) -> Result<BTreeMap<RelationType, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<RelationType, f64>::deserialize(deserializer)?;
    let mut weights = RelationWeightTable::default().weights;
    weights.extend(overrides);
    Ok(weights)
}

impl RelationWeightTable {
    pub fn weight(&self, relation_type: RelationType) -> f64 {
        self.weights
            .get(&relation_type)
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    pub weights: IntensityWeights,
    pub relation_weights: RelationWeightTable,
    /// Factor applied to cross-domain relations (1.0 otherwise)
    pub cross_domain_factor: f64,
    /// Minimum number of edges before the linear predictor is fit
    pub predictor_min_samples: usize,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            weights: IntensityWeights::default(),
            relation_weights: RelationWeightTable::default(),
            cross_domain_factor: 1.5,
            predictor_min_samples: 6,
        }
    }
}

impl IntensityConfig {
    pub fn validate(&self) -> Result<(), GraphError> {
        let w = &self.weights;
        let mut values = vec![
            w.strength,
            w.friction,
            w.escalation,
            w.cross_domain,
            w.relation_type,
            self.cross_domain_factor,
            self.relation_weights.default,
        ];
        values.extend(self.relation_weights.weights.values().copied());
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(invalid("intensity weights must be finite and non-negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityConfig {
    /// Louvain resolution parameter (higher = smaller communities)
    pub louvain_resolution: f64,
    pub louvain_max_iterations: usize,
    /// Upper bound of the spectral k search
    pub spectral_max_clusters: usize,
    /// Spectral clustering is skipped above this many nodes
    pub spectral_max_nodes: usize,
    pub kmeans_max_iterations: usize,
    /// Seed for k-means initialization
    pub seed: u64,
    /// Betweenness percentile (0–100) at or above which a node is a bridge
    pub bridge_percentile: f64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            louvain_resolution: 1.0,
            louvain_max_iterations: 100,
            spectral_max_clusters: 10,
            spectral_max_nodes: 400,
            kmeans_max_iterations: 100,
            seed: 42,
            bridge_percentile: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralityConfig {
    /// Iteration cap for eigenvector, HITS and Katz
    pub max_iterations: usize,
    /// Convergence tolerance per node
    pub tolerance: f64,
    pub pagerank_damping: f64,
    pub pagerank_max_iterations: usize,
    pub katz_alpha: f64,
    pub katz_beta: f64,
    /// Length of each ranking
    pub top_k: usize,
    /// Entries per ranking that count towards `high_centrality`
    pub critical_top_k: usize,
    pub high_conflict_percentile: f64,
    pub cross_domain_percentile: f64,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            pagerank_damping: 0.85,
            pagerank_max_iterations: 100,
            katz_alpha: 0.1,
            katz_beta: 1.0,
            top_k: 10,
            critical_top_k: 5,
            high_conflict_percentile: 80.0,
            cross_domain_percentile: 75.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Monte-Carlo cascade trials
    pub trials: usize,
    /// Transmission rate used when no intensity model is supplied
    pub default_transmission_rate: f64,
    pub min_transmission_rate: f64,
    pub max_transmission_rate: f64,
    pub recovery_rate: f64,
    pub spontaneous_rate: f64,
    /// Scale of back-influence along the reverse direction of a relation
    pub reverse_influence: f64,
    /// A cascade fraction is critical once fewer trials than this exceed it
    pub cascade_tail_probability: f64,
    pub forecast_steps: usize,
    /// Number of automatically chosen forecast seeds
    pub forecast_seeds: usize,
    /// Explicit forecast seed IDs; when empty, seeds are chosen automatically
    pub seed_nodes: Vec<String>,
    /// Infected mass placed on each forecast seed
    pub initial_infection: f64,
    pub seed: u64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            trials: 100,
            default_transmission_rate: 0.3,
            min_transmission_rate: 0.1,
            max_transmission_rate: 0.8,
            recovery_rate: 0.1,
            spontaneous_rate: 0.05,
            reverse_influence: 0.8,
            cascade_tail_probability: 0.05,
            forecast_steps: 50,
            forecast_seeds: 3,
            seed_nodes: Vec::new(),
            initial_infection: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustnessConfig {
    /// Increment of the random-attack removal fraction
    pub fraction_step: f64,
    /// Largest random-attack fraction (also the saturating threshold)
    pub max_fraction: f64,
    /// Number of critical-failure nodes reported
    pub top_k: usize,
    pub seed: u64,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            fraction_step: 0.05,
            max_fraction: 0.9,
            top_k: 10,
            seed: 42,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.intensity.weights.strength - 0.30).abs() < f64::EPSILON);
        assert_eq!(config.propagation.trials, 100);
        assert_eq!(config.centrality.max_iterations, 1000);
        assert_eq!(config.topology.small_world_min_nodes, 10);
    }

    #[test]
    fn test_relation_weight_table() {
        let table = RelationWeightTable::default();
        assert!((table.weight(RelationType::Opposition) - 2.0).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Cooperation) - 0.5).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Other) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = AnalysisConfig::default();
        config.intensity.weights.friction = -0.1;
        assert!(matches!(config.validate(), Err(GraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = AnalysisConfig::default();
        config.propagation.min_transmission_rate = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "propagation:\n  trials: 25\nintensity:\n  relation_weights:\n    weights:\n      opposition: 3.0\n"
        )
        .unwrap();

        let config = AnalysisConfig::load_yaml(file.path()).unwrap();
        assert_eq!(config.propagation.trials, 25);
        assert!((config.propagation.recovery_rate - 0.1).abs() < f64::EPSILON);
        assert!(
            (config.intensity.relation_weights.weight(RelationType::Opposition) - 3.0).abs()
                < f64::EPSILON
        );
        assert!((config.intensity.relation_weights.default - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_relation_weight_override_keeps_other_types() {
        let yaml = "intensity:\n  relation_weights:\n    weights:\n      opposition: 3.0\n";
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        let table = &config.intensity.relation_weights;
        assert!((table.weight(RelationType::Opposition) - 3.0).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Competition) - 1.5).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Constraint) - 1.3).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Dependency) - 0.8).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Cooperation) - 0.5).abs() < f64::EPSILON);
        assert!((table.weight(RelationType::Other) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_yaml_falls_back_to_defaults() {
        let config =
            AnalysisConfig::load_yaml(Path::new("/definitely/not/here/config.yaml")).unwrap();
        assert_eq!(config.cache_capacity, 16);
    }

    #[test]
    fn test_set_seed_applies_everywhere() {
        let mut config = AnalysisConfig::default();
        config.set_seed(7);
        assert_eq!(config.topology.seed, 7);
        assert_eq!(config.community.seed, 7);
        assert_eq!(config.propagation.seed, 7);
        assert_eq!(config.robustness.seed, 7);
    }
}
