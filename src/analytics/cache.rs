//! Read-through cache for topology metrics.
//!
//! Keys combine the graph fingerprint with the topology settings that affect
//! the result, so a changed seed never returns stale small-world indices. The
//! cache is owned by its orchestrator; nothing is shared globally.

use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;

use super::config::TopologyConfig;
use super::topology::{analyze_topology_with, TopologyMetrics};
use crate::graph::ConflictGraph;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct AnalysisCache {
    topology: LruCache<String, TopologyMetrics>,
    stats: CacheStats,
}

impl AnalysisCache {
    /// Cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            topology: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    fn key(fingerprint: &str, config: &TopologyConfig) -> String {
        format!(
            "{}:{}:{}",
            fingerprint, config.seed, config.small_world_min_nodes
        )
    }

    /// Cached topology metrics, if present.
    pub fn topology(&mut self, fingerprint: &str, config: &TopologyConfig) -> Option<TopologyMetrics> {
        self.topology.get(&Self::key(fingerprint, config)).cloned()
    }

    /// Return cached metrics or compute and store them. The flag is true on a hit.
    pub fn get_or_compute_topology(
        &mut self,
        graph: &ConflictGraph,
        fingerprint: &str,
        config: &TopologyConfig,
    ) -> (TopologyMetrics, bool) {
        if let Some(metrics) = self.topology(fingerprint, config) {
            self.stats.hits += 1;
            debug!("Topology cache hit for {}", fingerprint);
            return (metrics, true);
        }
        self.stats.misses += 1;
        let metrics = analyze_topology_with(graph, config);
        self.topology
            .put(Self::key(fingerprint, config), metrics.clone());
        (metrics, false)
    }

    /// Drop every entry. Call whenever the underlying graph changes.
    pub fn clear(&mut self) {
        self.topology.clear();
    }

    pub fn len(&self) -> usize {
        self.topology.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl std::fmt::Debug for AnalysisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCache")
            .field("entries", &self.topology.len())
            .field("capacity", &self.topology.cap())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, Entity, EntityType, Relation, RelationType};

    fn pair() -> ConflictGraph {
        build_graph(
            vec![
                Entity::new("a", EntityType::Actor, &[]),
                Entity::new("b", EntityType::Actor, &[]),
            ],
            vec![Relation::new("a", "b", RelationType::Opposition, 1.0)],
        )
    }

    #[test]
    fn test_hit_after_miss() {
        let g = pair();
        let fp = g.fingerprint();
        let config = TopologyConfig::default();
        let mut cache = AnalysisCache::new(4);

        let (first, hit) = cache.get_or_compute_topology(&g, &fp, &config);
        assert!(!hit);
        let (second, hit) = cache.get_or_compute_topology(&g, &fp, &config);
        assert!(hit);
        assert_eq!(first, second);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_seed_is_part_of_key() {
        let g = pair();
        let fp = g.fingerprint();
        let mut cache = AnalysisCache::new(4);
        cache.get_or_compute_topology(&g, &fp, &TopologyConfig::default());
        let other = TopologyConfig {
            seed: 7,
            ..TopologyConfig::default()
        };
        assert!(cache.topology(&fp, &other).is_none());
    }

    #[test]
    fn test_clear_and_eviction() {
        let g = pair();
        let config = TopologyConfig::default();
        let mut cache = AnalysisCache::new(1);
        cache.get_or_compute_topology(&g, "one", &config);
        cache.get_or_compute_topology(&g, "two", &config);
        assert_eq!(cache.len(), 1);
        assert!(cache.topology("one", &config).is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut cache = AnalysisCache::new(0);
        cache.get_or_compute_topology(&pair(), "fp", &TopologyConfig::default());
        assert_eq!(cache.len(), 1);
    }
}
