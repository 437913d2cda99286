//! Conflict propagation: Monte-Carlo cascades and S/I/R mass forecasts.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, warn};

use super::config::PropagationConfig;
use super::intensity::IntensityModel;
use super::stats;
use crate::graph::ConflictGraph;

/// Directed influence between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceEntry {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadeDistribution {
    pub trials: usize,
    /// Cascade size → number of trials
    pub histogram: BTreeMap<usize, usize>,
    pub mean_size: f64,
    pub max_size: usize,
    /// Fraction of trials in which each entity was reached
    pub node_hit_frequency: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub seed: String,
    pub initial_infection: f64,
    /// Total infected mass after each step
    pub infected_series: Vec<f64>,
    pub peak_step: usize,
    pub peak_infected: f64,
    pub final_recovered: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationModel {
    pub transmission_rate: f64,
    pub recovery_rate: f64,
    pub spontaneous_rate: f64,
    /// Non-zero influences, sorted by source then target
    pub influence: Vec<InfluenceEntry>,
    pub cascades: CascadeDistribution,
    /// Smallest fraction of nodes that fewer than the tail share of cascades exceed
    pub critical_cascade_threshold: f64,
    pub forecasts: Vec<Forecast>,
}

pub fn simulate_propagation(
    graph: &ConflictGraph,
    intensity: Option<&IntensityModel>,
) -> PropagationModel {
    simulate_propagation_with(graph, intensity, &PropagationConfig::default())
}

pub fn simulate_propagation_with(
    graph: &ConflictGraph,
    intensity: Option<&IntensityModel>,
    config: &PropagationConfig,
) -> PropagationModel {
    let transmission_rate = match intensity {
        Some(model) => (model.mean_edge_intensity() / 2.0)
            .clamp(config.min_transmission_rate, config.max_transmission_rate),
        None => config.default_transmission_rate,
    };

    let influence = influence_matrix(graph, transmission_rate, config.reverse_influence);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let cascades = simulate_cascades(graph, transmission_rate, config.trials, &mut rng);
    let critical_cascade_threshold = critical_threshold(
        &cascades,
        graph.node_count(),
        config.cascade_tail_probability,
    );

    let forecasts: Vec<Forecast> = forecast_seeds(graph, intensity, config)
        .into_iter()
        .map(|seed| {
            let id = graph.node_id(NodeIndex::new(seed));
            let initial = seed_infection(id, intensity, config);
            forecast(graph.node_count(), &influence, seed, id, initial, config)
        })
        .collect();

    debug!(
        "Propagation: rate={:.3}, mean cascade={:.2}, threshold={:.1}",
        transmission_rate, cascades.mean_size, critical_cascade_threshold
    );

    let mut entries: Vec<InfluenceEntry> = influence
        .iter()
        .map(|(&(s, t), &w)| InfluenceEntry {
            source: graph.node_id(NodeIndex::new(s)).to_string(),
            target: graph.node_id(NodeIndex::new(t)).to_string(),
            weight: w,
        })
        .collect();
    entries.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.target.cmp(&b.target)));

    PropagationModel {
        transmission_rate,
        recovery_rate: config.recovery_rate,
        spontaneous_rate: config.spontaneous_rate,
        influence: entries,
        cascades,
        critical_cascade_threshold,
        forecasts,
    }
}

/// `strength × friction × rate` forward, scaled by `reverse` backwards;
/// parallel contributions to the same ordered pair reduce by maximum.
fn influence_matrix(
    graph: &ConflictGraph,
    rate: f64,
    reverse: f64,
) -> HashMap<(usize, usize), f64> {
    let mut matrix: HashMap<(usize, usize), f64> = HashMap::new();
    let mut offer = |key: (usize, usize), value: f64| {
        if value > 0.0 {
            let slot = matrix.entry(key).or_insert(0.0);
            *slot = slot.max(value);
        }
    };
    for edge in graph.graph.edge_references() {
        let (s, t) = (edge.source().index(), edge.target().index());
        if s == t {
            continue;
        }
        let relation = edge.weight();
        let forward = relation.strength * relation.friction * rate;
        offer((s, t), forward);
        offer((t, s), forward * reverse);
    }
    matrix
}

fn simulate_cascades<R: Rng + ?Sized>(
    graph: &ConflictGraph,
    rate: f64,
    trials: usize,
    rng: &mut R,
) -> CascadeDistribution {
    let n = graph.node_count();
    if n == 0 || trials == 0 {
        return CascadeDistribution::default();
    }

    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    let mut hits = vec![0usize; n];
    let mut sizes = Vec::with_capacity(trials);
    for _ in 0..trials {
        let seed = rng.gen_range(0..n);
        let mut infected = vec![false; n];
        infected[seed] = true;
        let mut queue = VecDeque::from([seed]);
        let mut size = 1usize;
        while let Some(current) = queue.pop_front() {
            for (next, _) in graph.outgoing(NodeIndex::new(current)) {
                let next = next.index();
                if !infected[next] && rng.gen::<f64>() < rate {
                    infected[next] = true;
                    size += 1;
                    queue.push_back(next);
                }
            }
        }
        for (i, &hit) in infected.iter().enumerate() {
            if hit {
                hits[i] += 1;
            }
        }
        *histogram.entry(size).or_default() += 1;
        sizes.push(size as f64);
    }

    CascadeDistribution {
        trials,
        histogram,
        mean_size: stats::mean(&sizes),
        max_size: sizes.iter().map(|&s| s as usize).max().unwrap_or(0),
        node_hit_frequency: graph
            .graph
            .node_indices()
            .map(|idx| {
                (
                    graph.node_id(idx).to_string(),
                    hits[idx.index()] as f64 / trials as f64,
                )
            })
            .collect(),
    }
}

/// Smallest `f ∈ {0.1, …, 0.9}` such that fewer than `tail` of the trials
/// produced a cascade larger than `f·n`; 0.5 when none qualifies.
fn critical_threshold(cascades: &CascadeDistribution, n: usize, tail: f64) -> f64 {
    let limit = tail * cascades.trials as f64;
    (1..=9)
        .map(|i| i as f64 / 10.0)
        .find(|&f| {
            let exceeding: usize = cascades
                .histogram
                .iter()
                .filter(|(&size, _)| size as f64 > f * n as f64)
                .map(|(_, &count)| count)
                .sum();
            (exceeding as f64) < limit
        })
        .unwrap_or(0.5)
}

fn forecast_seeds(
    graph: &ConflictGraph,
    intensity: Option<&IntensityModel>,
    config: &PropagationConfig,
) -> Vec<usize> {
    if !config.seed_nodes.is_empty() {
        return config
            .seed_nodes
            .iter()
            .filter_map(|id| {
                let idx = graph.get_index(id);
                if idx.is_none() {
                    warn!("Ignoring unknown forecast seed '{}'", id);
                }
                idx.map(|i| i.index())
            })
            .collect();
    }

    let score: Vec<f64> = match intensity {
        Some(model) => model.node_vector(graph),
        None => {
            let simple = graph.to_simple();
            (0..simple.node_count())
                .map(|i| simple.degree(i) as f64)
                .collect()
        }
    };
    let mut order: Vec<usize> = (0..score.len()).collect();
    order.sort_by(|&a, &b| {
        score[b].total_cmp(&score[a]).then_with(|| {
            graph
                .node_id(NodeIndex::new(a))
                .cmp(graph.node_id(NodeIndex::new(b)))
        })
    });
    order.truncate(config.forecast_seeds);
    order
}

/// Infected mass placed on a seed: its node intensity when a model is
/// supplied, the configured mass otherwise. Clamped to `[0, 1]`.
fn seed_infection(id: &str, intensity: Option<&IntensityModel>, config: &PropagationConfig) -> f64 {
    intensity
        .and_then(|model| model.node_intensity(id))
        .unwrap_or(config.initial_infection)
        .clamp(0.0, 1.0)
}

/// Discrete-time S/I/R mass simulation from a single seed.
fn forecast(
    n: usize,
    influence: &HashMap<(usize, usize), f64>,
    seed: usize,
    seed_id: &str,
    initial: f64,
    config: &PropagationConfig,
) -> Forecast {
    let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (&(s, t), &w) in influence {
        incoming[t].push((s, w));
    }

    let mut susceptible = vec![1.0; n];
    let mut infected = vec![0.0; n];
    let mut recovered = vec![0.0; n];
    susceptible[seed] = 1.0 - initial;
    infected[seed] = initial;

    let mut series = Vec::with_capacity(config.forecast_steps);
    for _ in 0..config.forecast_steps {
        let mut next_s = susceptible.clone();
        let mut next_i = infected.clone();
        let mut next_r = recovered.clone();
        for v in 0..n {
            let pressure: f64 = incoming[v]
                .iter()
                .map(|&(u, w)| w * infected[u] * susceptible[v])
                .sum();
            // Spontaneous outbreaks draw on the whole susceptible mass
            let spontaneous = config.spontaneous_rate * susceptible[v];
            let infection = (pressure + spontaneous).min(susceptible[v]);
            let recovery = config.recovery_rate * infected[v];

            next_s[v] = (susceptible[v] - infection).clamp(0.0, 1.0);
            next_i[v] = (infected[v] + infection - recovery).clamp(0.0, 1.0);
            next_r[v] = (recovered[v] + recovery).clamp(0.0, 1.0);
        }
        susceptible = next_s;
        infected = next_i;
        recovered = next_r;
        series.push(infected.iter().sum::<f64>());
    }

    let (peak_step, peak_infected) = series
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (step, value)| {
            if value > best.1 {
                (step, value)
            } else {
                best
            }
        });

    Forecast {
        seed: seed_id.to_string(),
        initial_infection: initial,
        infected_series: series,
        peak_step,
        peak_infected: peak_infected.max(0.0),
        final_recovered: recovered.iter().sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::intensity::build_intensity_model;
    use crate::graph::{build_graph, Entity, EntityType, Relation, RelationType};

    fn chain(n: usize) -> ConflictGraph {
        let nodes = (0..n)
            .map(|i| Entity::new(&format!("n{}", i), EntityType::Actor, &["d"]))
            .collect();
        let edges = (0..n - 1)
            .map(|i| {
                Relation::new(&format!("n{}", i), &format!("n{}", i + 1), RelationType::Opposition, 1.0)
            })
            .collect();
        build_graph(nodes, edges)
    }

    #[test]
    fn test_default_rates_without_model() {
        let model = simulate_propagation(&chain(5), None);
        assert!((model.transmission_rate - 0.3).abs() < 1e-12);
        assert!((model.recovery_rate - 0.1).abs() < 1e-12);
        assert!((model.spontaneous_rate - 0.05).abs() < 1e-12);
        assert_eq!(model.cascades.trials, 100);
        assert_eq!(model.cascades.histogram.values().sum::<usize>(), 100);
    }

    #[test]
    fn test_transmission_rate_clamped_from_intensity() {
        let g = chain(4);
        let intensity = build_intensity_model(&g);
        let model = simulate_propagation(&g, Some(&intensity));
        let expected = (intensity.mean_edge_intensity() / 2.0).clamp(0.1, 0.8);
        assert!((model.transmission_rate - expected).abs() < 1e-12);
    }

    #[test]
    fn test_influence_reverse_and_parallel_max() {
        let nodes = vec![
            Entity::new("a", EntityType::Actor, &[]),
            Entity::new("b", EntityType::Actor, &[]),
        ];
        let mut weak = Relation::new("a", "b", RelationType::Opposition, 0.2);
        weak.friction = 1.0;
        let mut strong = Relation::new("a", "b", RelationType::Competition, 1.0);
        strong.friction = 1.0;
        let model = simulate_propagation(&build_graph(nodes, vec![weak, strong]), None);
        assert_eq!(model.influence.len(), 2);
        let forward = &model.influence[0];
        assert_eq!((forward.source.as_str(), forward.target.as_str()), ("a", "b"));
        assert!((forward.weight - 0.3).abs() < 1e-12);
        assert!((model.influence[1].weight - 0.3 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_cascades_are_seeded() {
        let g = chain(8);
        let a = simulate_propagation(&g, None);
        let b = simulate_propagation(&g, None);
        assert_eq!(a.cascades, b.cascades);
        assert!(a.cascades.max_size <= 8);
        assert!(a
            .cascades
            .node_hit_frequency
            .values()
            .all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn test_certain_transmission_reaches_whole_chain_from_root() {
        let config = PropagationConfig {
            default_transmission_rate: 1.0,
            ..PropagationConfig::default()
        };
        let model = simulate_propagation_with(&chain(5), None, &config);
        // Each cascade covers every node downstream of its seed
        assert!(model.cascades.histogram.keys().all(|&s| (1..=5).contains(&s)));
        assert!((model.cascades.node_hit_frequency["n4"] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_forecast_mass_bounds() {
        let model = simulate_propagation(&chain(6), None);
        assert_eq!(model.forecasts.len(), 3);
        for f in &model.forecasts {
            assert_eq!(f.infected_series.len(), 50);
            assert!(f.infected_series.iter().all(|&v| (0.0..=6.0).contains(&v)));
            assert!(f.peak_step < 50);
            assert!((f.peak_infected - f.infected_series[f.peak_step]).abs() < 1e-12);
            assert!(f.final_recovered >= 0.0 && f.final_recovered <= 6.0);
        }
    }

    #[test]
    fn test_forecast_seed_mass_follows_intensity() {
        let g = chain(4);
        let model = build_intensity_model(&g);
        let config = PropagationConfig {
            seed_nodes: vec!["n0".to_string()],
            ..PropagationConfig::default()
        };
        let result = simulate_propagation_with(&g, Some(&model), &config);
        let expected = model.node_intensity("n0").unwrap().clamp(0.0, 1.0);
        assert!((result.forecasts[0].initial_infection - expected).abs() < 1e-12);

        let without = simulate_propagation_with(&g, None, &config);
        assert!((without.forecasts[0].initial_infection - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spontaneous_infection_uses_full_susceptible_mass() {
        // Isolated node: only spontaneous infection and recovery act
        let g = build_graph(vec![Entity::new("solo", EntityType::Actor, &[])], vec![]);
        let config = PropagationConfig {
            seed_nodes: vec!["solo".to_string()],
            initial_infection: 0.0,
            spontaneous_rate: 0.1,
            recovery_rate: 0.0,
            forecast_steps: 2,
            ..PropagationConfig::default()
        };
        let result = simulate_propagation_with(&g, None, &config);
        let series = &result.forecasts[0].infected_series;
        assert!((series[0] - 0.1).abs() < 1e-12);
        assert!((series[1] - 0.19).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_forecast_seeds() {
        let config = PropagationConfig {
            seed_nodes: vec!["n2".to_string(), "missing".to_string()],
            ..PropagationConfig::default()
        };
        let model = simulate_propagation_with(&chain(4), None, &config);
        assert_eq!(model.forecasts.len(), 1);
        assert_eq!(model.forecasts[0].seed, "n2");
    }

    #[test]
    fn test_threshold_without_spread() {
        let config = PropagationConfig {
            default_transmission_rate: 0.0,
            ..PropagationConfig::default()
        };
        let model = simulate_propagation_with(&chain(10), None, &config);
        assert_eq!(model.cascades.histogram, BTreeMap::from([(1, 100)]));
        assert!((model.critical_cascade_threshold - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph() {
        let model = simulate_propagation(&ConflictGraph::new(), None);
        assert_eq!(model.cascades, CascadeDistribution::default());
        assert!(model.forecasts.is_empty());
        assert!((model.critical_cascade_threshold - 0.5).abs() < 1e-12);
    }
}
