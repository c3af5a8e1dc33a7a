//! Layered configuration (spec §6.7, §10.2). Grounded on `cortex-core/src/config/mod.rs`'s
//! `CortexConfig` aggregator: one `#[serde(default)]` struct per component, `Default`
//! impls matching the spec's documented defaults, and a `from_toml` + env-override
//! layering helper (`EngineConfig::from_env`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    pub violation_confidence_threshold: f32,
    pub confirm_confidence_threshold: f32,
    pub max_candidates: usize,
    pub min_similarity: f32,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            violation_confidence_threshold: 0.7,
            confirm_confidence_threshold: 0.75,
            max_candidates: 20,
            min_similarity: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShockConfig {
    pub max_hops: u32,
    pub alpha: f64,
    pub eta: f64,
    pub min_strength: f64,
    pub rho: f64,
    pub convergence_eps: f64,
    pub max_iter: u32,
    pub max_backtrack: u32,
}

impl Default for ShockConfig {
    fn default() -> Self {
        Self {
            max_hops: 2,
            alpha: 0.6,
            eta: 0.8,
            min_strength: 0.1,
            rho: 0.3,
            convergence_eps: 1e-3,
            max_iter: 20,
            max_backtrack: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub untested_max: u32,
    pub brittle_max: u32,
    pub robust_min_effective: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            untested_max: 3,
            brittle_max: 10,
            robust_min_effective: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverType {
    None,
    Webhook,
    IssueTracker,
}

impl Default for ResolverType {
    fn default() -> Self {
        ResolverType::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub resolver_type: ResolverType,
    pub resolver_url: Option<String>,
    pub resolver_token: Option<String>,
    pub max_retries: u32,
    pub retry_base_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            resolver_type: ResolverType::None,
            resolver_url: None,
            resolver_token: None,
            max_retries: 3,
            retry_base_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub inactivity_ms: i64,
    pub minute_tick_enabled: bool,
    pub daily_tick_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            inactivity_ms: 30_000,
            minute_tick_enabled: true,
            daily_tick_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub max_retries: u32,
    pub queue_capacity: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub judge_url: Option<String>,
    pub judge_api_key: Option<String>,
    pub judge_model: Option<String>,
    pub embedding_model: Option<String>,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            judge_url: None,
            judge_api_key: None,
            judge_model: None,
            embedding_model: None,
            retry_attempts: 2,
            retry_base_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "verity.db".to_string(),
        }
    }
}

/// Top-level configuration aggregating all subsystem configs, per spec §10.2.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub exposure: ExposureConfig,
    pub shock: ShockConfig,
    pub confidence: ConfidenceConfig,
    pub dispatch: DispatchConfig,
    pub scheduler: SchedulerConfig,
    pub intake: IntakeConfig,
    pub embedding: EmbeddingConfig,
}

impl EngineConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Layer: compiled defaults → optional `verity.toml` → `VERITY_*` environment
    /// variable overrides, per spec §6.7/§10.2.
    pub fn from_env() -> Self {
        let mut config = std::fs::read_to_string("verity.toml")
            .ok()
            .and_then(|s| Self::from_toml(&s).ok())
            .unwrap_or_default();

        if let Ok(v) = std::env::var("VERITY_VIOLATION_CONFIDENCE_THRESHOLD") {
            if let Ok(v) = v.parse() {
                config.exposure.violation_confidence_threshold = v;
            }
        }
        if let Ok(v) = std::env::var("VERITY_CONFIRM_CONFIDENCE_THRESHOLD") {
            if let Ok(v) = v.parse() {
                config.exposure.confirm_confidence_threshold = v;
            }
        }
        if let Ok(v) = std::env::var("VERITY_MAX_CANDIDATES") {
            if let Ok(v) = v.parse() {
                config.exposure.max_candidates = v;
            }
        }
        if let Ok(v) = std::env::var("VERITY_MIN_SIMILARITY") {
            if let Ok(v) = v.parse() {
                config.exposure.min_similarity = v;
            }
        }
        if let Ok(v) = std::env::var("VERITY_INACTIVITY_MS") {
            if let Ok(v) = v.parse() {
                config.scheduler.inactivity_ms = v;
            }
        }
        if let Ok(v) = std::env::var("VERITY_RESOLVER_TYPE") {
            config.dispatch.resolver_type = match v.as_str() {
                "webhook" => ResolverType::Webhook,
                "issue_tracker" => ResolverType::IssueTracker,
                _ => ResolverType::None,
            };
        }
        if let Ok(v) = std::env::var("VERITY_RESOLVER_URL") {
            config.dispatch.resolver_url = Some(v);
        }
        if let Ok(v) = std::env::var("VERITY_RESOLVER_TOKEN") {
            config.dispatch.resolver_token = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_JUDGE_URL") {
            config.embedding.judge_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_JUDGE_API_KEY") {
            config.embedding.judge_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_JUDGE_MODEL") {
            config.embedding.judge_model = Some(v);
        }
        if let Ok(v) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.embedding_model = Some(v);
        }
        if let Ok(v) = std::env::var("VERITY_DATABASE_PATH") {
            config.storage.database_path = v;
        }

        config
    }
}
