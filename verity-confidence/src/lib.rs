//! The Confidence Engine (C3, spec §4.3): a Subjective Logic blend of prior and
//! earned evidence, robustness tiers, and scoring. Every function here is pure —
//! no I/O, no shared state — matching `cortex-decay`'s plain free-function shape.

use verity_core::config::ConfidenceConfig;
use verity_core::memory::{DamageLevel, Memory, MemoryKind, MemoryState, Outcome, Source};
use verity_core::stats::SystemStats;

/// Coarse label of testing maturity, per spec §4.3/Glossary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobustnessTier {
    Untested,
    Brittle,
    Tested,
    Robust,
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// `evidence_weight(t) = log(t+1)/log(M+1)`, clamped to [0,1].
pub fn evidence_weight(times_tested: u32, max_times_tested: f64) -> f64 {
    let m = max_times_tested.max(1.0);
    let w = ((times_tested as f64) + 1.0).ln() / (m + 1.0).ln();
    clamp01(w)
}

/// `earned(m) = confirmations / max(times_tested,1)`.
pub fn earned(confirmations: u32, times_tested: u32) -> f64 {
    confirmations as f64 / times_tested.max(1) as f64
}

/// `local(m) = clamp01(starting_confidence*(1-w) + earned*w)`.
pub fn local(starting_confidence: f64, confirmations: u32, times_tested: u32, max_times_tested: f64) -> f64 {
    let w = evidence_weight(times_tested, max_times_tested);
    let e = earned(confirmations, times_tested);
    clamp01(starting_confidence * (1.0 - w) + e * w)
}

/// `effective(m) = local(m)` if no propagated confidence, else the 0.6/0.4 blend.
pub fn effective(local_value: f64, propagated_confidence: Option<f64>) -> f64 {
    match propagated_confidence {
        None => clamp01(local_value),
        Some(p) => clamp01(0.6 * p + 0.4 * local_value),
    }
}

/// Convenience: compute `effective` directly from a [`Memory`] and the current
/// [`SystemStats`].
pub fn effective_for_memory(memory: &Memory, stats: &SystemStats) -> f64 {
    let l = local(
        memory.starting_confidence,
        memory.confirmations,
        memory.times_tested,
        stats.max_times_tested(),
    );
    effective(l, memory.propagated_confidence)
}

/// Robustness tier from times_tested and effective confidence, per spec §4.3
/// defaults `U=3, B=10, R_min=0.7`.
pub fn robustness(times_tested: u32, effective_confidence: f64, config: &ConfidenceConfig) -> RobustnessTier {
    if times_tested < config.untested_max {
        RobustnessTier::Untested
    } else if times_tested < config.brittle_max {
        RobustnessTier::Brittle
    } else if effective_confidence >= config.robust_min_effective {
        RobustnessTier::Robust
    } else {
        RobustnessTier::Tested
    }
}

/// `damage_level(centrality) = core` if `centrality>5` else `peripheral`.
pub fn damage_level(centrality: u32) -> DamageLevel {
    DamageLevel::from_centrality(centrality)
}

/// `score(m, sim) = sim*(1 + effective*0.5)`, penalized 0.3x if resolved
/// incorrect/superseded (spec §4.3).
pub fn score(similarity: f32, effective_confidence: f64, state: MemoryState, outcome: Option<Outcome>) -> f32 {
    let base = similarity as f64 * (1.0 + effective_confidence * 0.5);
    let penalized = if state == MemoryState::Resolved
        && matches!(outcome, Some(Outcome::Incorrect) | Some(Outcome::Superseded))
    {
        base * 0.3
    } else {
        base
    };
    penalized as f32
}

/// `starting_confidence` chosen at create time, per spec §4.3: observations use
/// per-source priors (from system stats, falling back to hardcoded defaults);
/// thoughts 0.40; time-bound thoughts (predictions) 0.35.
pub fn starting_confidence(kind: MemoryKind, source: Option<Source>, stats: &SystemStats) -> f64 {
    match kind {
        MemoryKind::Observation => source.map(|s| stats.source_prior(s)).unwrap_or(0.5),
        MemoryKind::Thought => 0.40,
        MemoryKind::Prediction => 0.35,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_weight_grows_with_tests_and_clamps() {
        assert_eq!(evidence_weight(0, 10.0), 0.0);
        let w5 = evidence_weight(5, 10.0);
        let w9 = evidence_weight(9, 10.0);
        assert!(w5 < w9);
        assert!(w9 <= 1.0 + 1e-9);
    }

    #[test]
    fn local_blends_prior_and_earned() {
        // No tests yet: local == starting_confidence exactly.
        let l = local(0.75, 0, 0, 10.0);
        assert!((l - 0.75).abs() < 1e-9);
    }

    #[test]
    fn effective_blends_propagated_and_local() {
        let e = effective(0.5, Some(1.0));
        assert!((e - (0.6 * 1.0 + 0.4 * 0.5)).abs() < 1e-9);
        let e2 = effective(0.5, None);
        assert!((e2 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn robustness_tiers_follow_thresholds() {
        let cfg = ConfidenceConfig::default();
        assert_eq!(robustness(1, 0.9, &cfg), RobustnessTier::Untested);
        assert_eq!(robustness(5, 0.9, &cfg), RobustnessTier::Brittle);
        assert_eq!(robustness(15, 0.9, &cfg), RobustnessTier::Robust);
        assert_eq!(robustness(15, 0.3, &cfg), RobustnessTier::Tested);
    }

    #[test]
    fn damage_level_threshold_is_strictly_greater_than_five() {
        assert_eq!(damage_level(5), DamageLevel::Peripheral);
        assert_eq!(damage_level(6), DamageLevel::Core);
    }

    #[test]
    fn score_penalizes_incorrect_resolution() {
        let s_active = score(0.8, 0.8, MemoryState::Active, None);
        let s_incorrect = score(0.8, 0.8, MemoryState::Resolved, Some(Outcome::Incorrect));
        assert!((s_incorrect - s_active * 0.3).abs() < 1e-4);
    }

    #[test]
    fn effective_always_in_bounds() {
        for sc in [0.0_f64, 0.3, 0.7, 1.0] {
            for conf in 0..=10u32 {
                for tested in 0..=10u32 {
                    let l = local(sc, conf.min(tested), tested, 10.0);
                    assert!((0.0..=1.0).contains(&l));
                    let e = effective(l, Some(0.9));
                    assert!((0.0..=1.0).contains(&e));
                }
            }
        }
    }
}
