//! The Shock Propagator (C6, spec §4.6): a damped, 2-hop iterative confidence
//! update over the support graph, with contradiction-edge injection and
//! spectral-radius backtracking so the iteration is guaranteed to contract.
//!
//! Grounded on the teacher's `GraphManager` (`Arc<RwLock<...>>`-shared, trait-seam
//! wrapped graph) shape, but built fresh: the teacher's `dag_enforcement`/`pruning`/
//! `stable_graph`/`sync` submodules never shipped in the retrieval pack, so this
//! crate owns its own lightweight in-memory graph view over `HashMap`/`VecDeque`
//! rather than a `petgraph` dependency.

use std::collections::{HashMap, HashSet, VecDeque};

use verity_core::config::ShockConfig;
use verity_core::edge::EdgeType;
use verity_core::errors::ShockError;
use verity_core::memory::DamageLevel;
use verity_core::traits::MemoryStorage;

/// One node's working state during propagation.
#[derive(Debug, Clone)]
struct NodeState {
    prior: f64,
    is_observation: bool,
    is_seed: bool,
    current: f64,
}

/// A directed, weighted edge kept for the duration of one propagation run.
#[derive(Debug, Clone, Copy)]
struct WeightedEdge {
    from: usize,
    to: usize,
    weight: f64,
}

/// Summary of one completed propagation, per spec §4.6 step 7.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ShockResult {
    pub affected_count: usize,
    pub max_confidence_drop: f64,
    pub top_affected: Vec<(String, f64)>,
    pub iterations: u32,
    pub spectral_radius: f64,
    pub backtrack_attempts: u32,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Run shock propagation seeded at `seed_id`, per spec §4.6.
pub async fn apply_shock<S: MemoryStorage>(
    store: &S,
    seed_id: &str,
    damage_level: DamageLevel,
    config: &ShockConfig,
) -> Result<ShockResult, ShockError> {
    // Step 1: BFS neighborhood up to MAX_HOPS through support edges with
    // strength >= MIN_STRENGTH.
    let mut ids: Vec<String> = vec![seed_id.to_string()];
    let mut index: HashMap<String, usize> = HashMap::new();
    index.insert(seed_id.to_string(), 0);

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(seed_id.to_string());
    let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
    frontier.push_back((seed_id.to_string(), 0));

    let mut support_edges: Vec<(String, String, f64)> = Vec::new();

    while let Some((node, hop)) = frontier.pop_front() {
        if hop >= config.max_hops {
            continue;
        }
        let edges = store.get_edges(&node).await.map_err(ShockError::Storage)?;
        for e in edges {
            if !e.edge_type.is_support() || e.strength < config.min_strength {
                continue;
            }
            let (from, to) = (e.source_id.clone(), e.target_id.clone());
            if from == node {
                support_edges.push((from.clone(), to.clone(), e.strength));
                if !visited.contains(&to) {
                    visited.insert(to.clone());
                    index.insert(to.clone(), ids.len());
                    ids.push(to.clone());
                    frontier.push_back((to, hop + 1));
                }
            } else if to == node {
                support_edges.push((from.clone(), to.clone(), e.strength));
                if !visited.contains(&from) {
                    visited.insert(from.clone());
                    index.insert(from.clone(), ids.len());
                    ids.push(from.clone());
                    frontier.push_back((from, hop + 1));
                }
            }
        }
    }
    support_edges.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);

    // Step 2: load rows.
    let mut nodes: Vec<NodeState> = Vec::with_capacity(ids.len());
    let stats_cache = store.system_stats().await.map_err(ShockError::Storage)?;
    for (i, id) in ids.iter().enumerate() {
        let mem = store
            .get(id)
            .await
            .map_err(ShockError::Storage)?
            .ok_or_else(|| ShockError::Storage(verity_core::errors::StorageError::NotFound { id: id.clone() }))?;
        let prior = verity_confidence::local(
            mem.starting_confidence,
            mem.confirmations,
            mem.times_tested,
            stats_cache.max_times_tested(),
        );
        nodes.push(NodeState {
            prior,
            is_observation: mem.source.is_some(),
            is_seed: i == 0,
            current: mem.propagated_confidence.unwrap_or(prior),
        });
    }

    // Step 3/4: contradiction edges, including freshly injected ones from the seed.
    let mut contradiction_edges: Vec<WeightedEdge> = Vec::new();
    for id in &ids {
        let edges = store.get_edges(id).await.map_err(ShockError::Storage)?;
        for e in edges {
            if e.edge_type != EdgeType::ViolatedBy {
                continue;
            }
            if let (Some(&from), Some(&to)) = (index.get(&e.source_id), index.get(&e.target_id)) {
                contradiction_edges.push(WeightedEdge { from, to, weight: e.strength });
            }
        }
    }

    let shock = match damage_level {
        DamageLevel::Core => 1.0,
        DamageLevel::Peripheral => 0.4,
    };
    let seed_out_total: f64 = support_edges
        .iter()
        .filter(|(from, _, _)| from == seed_id)
        .map(|(_, _, w)| w)
        .sum();
    let mut injected: Vec<(usize, usize, f64)> = Vec::new();
    if seed_out_total > 0.0 {
        for (from, to, w) in support_edges.iter().filter(|(from, _, _)| from == seed_id) {
            let inj = config.rho * shock * (w / seed_out_total);
            if inj < config.min_strength {
                continue;
            }
            let (Some(&from_idx), Some(&to_idx)) = (index.get(from), index.get(to)) else {
                continue;
            };
            injected.push((from_idx, to_idx, inj));
        }
    }
    for (from, to, w) in &injected {
        if let Some(existing) = contradiction_edges.iter_mut().find(|e| e.from == *from && e.to == *to) {
            existing.weight = (existing.weight + w).min(1.0);
        } else {
            contradiction_edges.push(WeightedEdge { from: *from, to: *to, weight: (*w).min(1.0) });
        }
    }

    let n = ids.len();
    let updatable: Vec<bool> = nodes.iter().map(|s| !s.is_seed && !s.is_observation).collect();

    // Build normalized adjacency (row-normalized per destination node, restricted to
    // updatable rows) for support and contradiction matrices.
    let build_matrix = |edges: &[WeightedEdge]| -> Vec<Vec<(usize, f64)>> {
        let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for e in edges {
            incoming[e.to].push((e.from, e.weight));
        }
        for row in incoming.iter_mut() {
            let total: f64 = row.iter().map(|(_, w)| w).sum();
            if total > 0.0 {
                for (_, w) in row.iter_mut() {
                    *w /= total;
                }
            }
        }
        incoming
    };

    let support_matrix = build_matrix(
        &support_edges
            .iter()
            .filter_map(|(f, t, w)| Some(WeightedEdge { from: *index.get(f)?, to: *index.get(t)?, weight: *w }))
            .collect::<Vec<_>>(),
    );
    let mut contradiction_matrix = build_matrix(&contradiction_edges);

    // Step 5: spectral safety. Estimate spectral radius of (alpha*A+ - eta*A-)
    // restricted to updatable rows via power iteration, backtracking by halving
    // injected contradiction edge strengths if it doesn't contract.
    let mut backtrack_attempts = 0u32;
    let mut spectral_radius = estimate_spectral_radius(&support_matrix, &contradiction_matrix, &updatable, config);

    let mut current_injected = injected.clone();
    while spectral_radius >= 1.0 && backtrack_attempts < config.max_backtrack {
        backtrack_attempts += 1;
        for (from, to, w) in current_injected.iter_mut() {
            *w /= 2.0;
            if let Some(existing) = contradiction_edges.iter_mut().find(|e| e.from == *from && e.to == *to) {
                existing.weight = (*w).min(1.0);
            }
        }
        contradiction_matrix = build_matrix(&contradiction_edges);
        spectral_radius = estimate_spectral_radius(&support_matrix, &contradiction_matrix, &updatable, config);
    }

    if spectral_radius >= 1.0 {
        return Err(ShockError::SpectralDivergence { attempts: backtrack_attempts });
    }

    // Step 6: damped iteration.
    let mut iterations = 0u32;
    for iter in 0..config.max_iter {
        iterations = iter + 1;
        let mut next = nodes.iter().map(|s| s.current).collect::<Vec<_>>();
        let mut max_change: f64 = 0.0;
        for i in 0..n {
            if !updatable[i] {
                continue;
            }
            let support_i: f64 = support_matrix[i].iter().map(|(j, w)| w * nodes[*j].current).sum();
            let contradiction_i: f64 = contradiction_matrix[i].iter().map(|(j, w)| w * nodes[*j].current).sum();
            let x = (1.0 - config.alpha) * nodes[i].prior + config.alpha * (support_i - config.eta * contradiction_i);
            let x = clamp01(x);
            max_change = max_change.max((x - nodes[i].current).abs());
            next[i] = x;
        }
        for i in 0..n {
            nodes[i].current = next[i];
        }
        if max_change < config.convergence_eps {
            break;
        }
    }

    // Step 7: write propagated_confidence for nodes that changed meaningfully.
    let mut affected: Vec<(String, f64)> = Vec::new();
    let mut max_drop = 0.0_f64;
    for i in 0..n {
        if !updatable[i] {
            continue;
        }
        let delta = nodes[i].current - nodes[i].prior;
        if delta.abs() > 1e-6 {
            store
                .set_propagated_confidence(&ids[i], Some(nodes[i].current))
                .await
                .map_err(ShockError::Storage)?;
            affected.push((ids[i].clone(), nodes[i].current - nodes[i].prior));
            max_drop = max_drop.max(-delta);
        }
    }
    affected.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_affected: Vec<(String, f64)> = affected.iter().take(25).cloned().collect();

    Ok(ShockResult {
        affected_count: affected.len(),
        max_confidence_drop: max_drop,
        top_affected,
        iterations,
        spectral_radius,
        backtrack_attempts,
    })
}

/// Power-iteration estimate of the spectral radius of `alpha*support - eta*contradiction`
/// restricted to updatable rows/cols.
fn estimate_spectral_radius(
    support: &[Vec<(usize, f64)>],
    contradiction: &[Vec<(usize, f64)>],
    updatable: &[bool],
    config: &ShockConfig,
) -> f64 {
    let n = support.len();
    let idxs: Vec<usize> = (0..n).filter(|&i| updatable[i]).collect();
    if idxs.is_empty() {
        return 0.0;
    }
    let mut v = vec![0.0; n];
    for &i in &idxs {
        v[i] = 1.0 / (idxs.len() as f64).sqrt();
    }

    let apply = |v: &[f64]| -> Vec<f64> {
        let mut out = vec![0.0; n];
        for &i in &idxs {
            let s: f64 = support[i].iter().map(|(j, w)| w * v[*j]).sum();
            let c: f64 = contradiction[i].iter().map(|(j, w)| w * v[*j]).sum();
            out[i] = config.alpha * s - config.eta * c;
        }
        out
    };

    let mut eigenvalue = 0.0;
    for _ in 0..30 {
        let w = apply(&v);
        let norm = w.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-12 {
            return 0.0;
        }
        eigenvalue = norm;
        v = w.into_iter().map(|x| x / norm).collect();
    }
    eigenvalue
}

/// Whole-graph propagation pass (spec §4.10 daily cadence): same equations as
/// `apply_shock` but with no contradiction injection, seeded at every non-observation
/// node independently is too expensive; instead this performs one global damped pass
/// treating all currently-recorded `violated_by` edges as the contradiction signal.
pub async fn propagate_global<S: MemoryStorage>(store: &S, config: &ShockConfig) -> Result<ShockResult, ShockError> {
    let all = store
        .find_by_query(verity_core::traits::MemoryQuery { include_retracted: false, ..Default::default() })
        .await
        .map_err(ShockError::Storage)?;

    if all.is_empty() {
        return Ok(ShockResult {
            affected_count: 0,
            max_confidence_drop: 0.0,
            top_affected: vec![],
            iterations: 0,
            spectral_radius: 0.0,
            backtrack_attempts: 0,
        });
    }

    let stats = store.system_stats().await.map_err(ShockError::Storage)?;
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut nodes: Vec<NodeState> = Vec::with_capacity(all.len());
    for (i, m) in all.iter().enumerate() {
        index.insert(m.id.clone(), i);
        let prior = verity_confidence::local(m.starting_confidence, m.confirmations, m.times_tested, stats.max_times_tested());
        nodes.push(NodeState {
            prior,
            is_observation: m.source.is_some(),
            is_seed: false,
            current: m.propagated_confidence.unwrap_or(prior),
        });
    }

    let mut support_edges: Vec<WeightedEdge> = Vec::new();
    let mut contradiction_edges: Vec<WeightedEdge> = Vec::new();
    for m in &all {
        let edges = store.get_edges(&m.id).await.map_err(ShockError::Storage)?;
        for e in edges {
            let (Some(&from), Some(&to)) = (index.get(&e.source_id), index.get(&e.target_id)) else {
                continue;
            };
            if e.edge_type.is_support() {
                support_edges.push(WeightedEdge { from, to, weight: e.strength });
            } else if e.edge_type == EdgeType::ViolatedBy {
                contradiction_edges.push(WeightedEdge { from, to, weight: e.strength });
            }
        }
    }

    let n = nodes.len();
    let updatable: Vec<bool> = nodes.iter().map(|s| !s.is_observation).collect();

    let build_matrix = |edges: &[WeightedEdge]| -> Vec<Vec<(usize, f64)>> {
        let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for e in edges {
            incoming[e.to].push((e.from, e.weight));
        }
        for row in incoming.iter_mut() {
            let total: f64 = row.iter().map(|(_, w)| w).sum();
            if total > 0.0 {
                for (_, w) in row.iter_mut() {
                    *w /= total;
                }
            }
        }
        incoming
    };
    let support_matrix = build_matrix(&support_edges);
    let contradiction_matrix = build_matrix(&contradiction_edges);

    let mut iterations = 0u32;
    for iter in 0..config.max_iter {
        iterations = iter + 1;
        let mut next = nodes.iter().map(|s| s.current).collect::<Vec<_>>();
        let mut max_change: f64 = 0.0;
        for i in 0..n {
            if !updatable[i] {
                continue;
            }
            let support_i: f64 = support_matrix[i].iter().map(|(j, w)| w * nodes[*j].current).sum();
            let contradiction_i: f64 = contradiction_matrix[i].iter().map(|(j, w)| w * nodes[*j].current).sum();
            let x = (1.0 - config.alpha) * nodes[i].prior + config.alpha * (support_i - config.eta * contradiction_i);
            let x = clamp01(x);
            max_change = max_change.max((x - nodes[i].current).abs());
            next[i] = x;
        }
        for i in 0..n {
            nodes[i].current = next[i];
        }
        if max_change < config.convergence_eps {
            break;
        }
    }

    let mut affected: Vec<(String, f64)> = Vec::new();
    let mut max_drop = 0.0_f64;
    for (i, m) in all.iter().enumerate() {
        if !updatable[i] {
            continue;
        }
        let delta = nodes[i].current - nodes[i].prior;
        if delta.abs() > 1e-6 {
            store
                .set_propagated_confidence(&m.id, Some(nodes[i].current))
                .await
                .map_err(ShockError::Storage)?;
            affected.push((m.id.clone(), delta));
            max_drop = max_drop.max(-delta);
        }
    }
    affected.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let top_affected = affected.iter().take(25).cloned().collect();

    Ok(ShockResult {
        affected_count: affected.len(),
        max_confidence_drop: max_drop,
        top_affected,
        iterations,
        spectral_radius: 0.0,
        backtrack_attempts: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verity_core::memory::{MemoryDraft, Source};
    use verity_storage::StorageEngine;

    #[tokio::test]
    async fn shock_on_isolated_seed_affects_nothing() {
        let store = StorageEngine::open_in_memory().unwrap();
        let seed = store
            .create_memory(MemoryDraft { content: "seed".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let config = ShockConfig::default();
        let result = apply_shock(&store, &seed.id, DamageLevel::Peripheral, &config).await.unwrap();
        assert_eq!(result.affected_count, 0);
    }

    #[tokio::test]
    async fn shock_propagates_into_a_downstream_thought() {
        let store = StorageEngine::open_in_memory().unwrap();
        let seed = store
            .create_memory(MemoryDraft { content: "seed".into(), source: Some(Source::Human), ..Default::default() })
            .await
            .unwrap();
        let child = store
            .create_memory(MemoryDraft {
                content: "derived".into(),
                derived_from: vec![seed.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        store.create_edge(&child.id, &seed.id, EdgeType::DerivedFrom, 0.9).await.unwrap();

        let config = ShockConfig::default();
        let result = apply_shock(&store, &seed.id, DamageLevel::Core, &config).await.unwrap();
        assert!(result.iterations > 0);
        let _ = Utc::now();
    }
}
