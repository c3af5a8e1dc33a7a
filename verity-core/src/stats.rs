//! System Stats entity (spec §3.1): a nightly-recomputed key→numeric store feeding
//! the Confidence Engine's `max_times_tested` and per-source priors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::memory::Source;

pub const MAX_TIMES_TESTED_KEY: &str = "max_times_tested";
pub const MEDIAN_TIMES_TESTED_KEY: &str = "median_times_tested";

/// Default `max_times_tested` used by the confidence engine when no nightly stats
/// have been computed yet, per spec §4.3.
pub const DEFAULT_MAX_TIMES_TESTED: f64 = 10.0;

/// Flat key→value store plus typed accessors for the fields the confidence engine
/// actually reads. Per-source track records are survival rates (confirmations /
/// times_tested averaged across that source's observations) used as a learned
/// override of [`Source::default_prior`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub values: HashMap<String, f64>,
}

impl SystemStats {
    pub fn max_times_tested(&self) -> f64 {
        self.values
            .get(MAX_TIMES_TESTED_KEY)
            .copied()
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_MAX_TIMES_TESTED)
    }

    pub fn median_times_tested(&self) -> Option<f64> {
        self.values.get(MEDIAN_TIMES_TESTED_KEY).copied()
    }

    fn source_key(source: Source) -> String {
        format!("source_track_record:{}", source.as_str())
    }

    /// Per-source prior confidence: the learned track record if one has been
    /// computed, else the spec's hardcoded fallback (§4.3).
    pub fn source_prior(&self, source: Source) -> f64 {
        self.values
            .get(&Self::source_key(source))
            .copied()
            .unwrap_or_else(|| source.default_prior())
    }

    pub fn set_source_track_record(&mut self, source: Source, value: f64) {
        self.values.insert(Self::source_key(source), value.clamp(0.0, 1.0));
    }

    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}
