//! The Embedding Client (C4, spec §4.4): text->dense vector, and the LLM judge
//! with a strict JSON-schema response. Grounded on the teacher's
//! `cortex_cloud::transport::{HttpClient, HttpClientConfig}` retry/backoff idiom,
//! repurposed from sync-push transport to judge/embedding request-response.

pub mod parse;
pub mod prompts;

use std::time::Duration;

use serde_json::json;

use verity_core::errors::EmbeddingError;
use verity_core::traits::{ConditionKind, EmbeddingProvider, Judge, JudgeVerdict};

/// Shared HTTP transport configuration, mirroring `HttpClientConfig`'s shape in
/// the teacher's cloud-sync crate.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub retry_attempts: u32,
    pub retry_base_ms: u64,
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
            retry_attempts: 2,
            retry_base_ms: 100,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Retry an async operation with exponential backoff, per spec §4.4 (2 attempts,
/// 100ms base) — the same shape the dispatcher (C9) reuses with different
/// constants (3 attempts, 5s base).
pub async fn retry_with_backoff<T, E, F, Fut>(attempts: u32, base_ms: u64, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for attempt in 0..=attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                if attempt < attempts {
                    let backoff = base_ms * 2u64.pow(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

/// HTTP-backed embedding + judge client. When no `base_url` is configured (the
/// common case for tests and offline operation), `embed` falls back to a
/// deterministic hash-based pseudo-embedding and `judge` always returns a
/// conservative no-match — callers inject a real backend via `HttpClientConfig`
/// in production.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl EmbeddingClient {
    pub fn new(config: HttpClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Deterministic fallback embedding: stable across calls for the same text,
    /// used when no embedding backend is configured (tests, offline mode).
    fn fallback_embed(text: &str) -> Vec<f32> {
        const DIM: usize = 32;
        let mut v = vec![0.0f32; DIM];
        for (i, byte) in text.bytes().enumerate() {
            v[i % DIM] += byte as f32 / 255.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let Some(base_url) = self.config.base_url.clone() else {
            return Ok(Self::fallback_embed(text));
        };

        let text = text.to_string();
        let result = retry_with_backoff(self.config.retry_attempts, self.config.retry_base_ms, || {
            let base_url = base_url.clone();
            let text = text.clone();
            async {
                let mut req = self.http.post(format!("{base_url}/embeddings")).json(&json!({
                    "input": text,
                    "model": self.config.model,
                }));
                if let Some(key) = &self.config.api_key {
                    req = req.bearer_auth(key);
                }
                let resp = req.send().await.map_err(|e| EmbeddingError::Transport(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(EmbeddingError::Transport(format!("status {}", resp.status())));
                }
                let body: serde_json::Value = resp
                    .json()
                    .await
                    .map_err(|_| EmbeddingError::JudgeParse)?;
                let vec: Vec<f32> = body
                    .get("embedding")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|x| x.as_f64()).map(|x| x as f32).collect())
                    .unwrap_or_default();
                Ok(vec)
            }
        })
        .await;

        result.map_err(|e: EmbeddingError| EmbeddingError::RetriesExhausted {
            attempts: self.config.retry_attempts,
            last_error: e.to_string(),
        })
    }
}

impl Judge for EmbeddingClient {
    async fn judge(
        &self,
        kind: ConditionKind,
        condition: &str,
        candidate_content: &str,
    ) -> Result<JudgeVerdict, EmbeddingError> {
        let Some(base_url) = self.config.base_url.clone() else {
            return Ok(JudgeVerdict::default());
        };

        let prompt = prompts::build_prompt(kind, condition, candidate_content);

        let result = retry_with_backoff(self.config.retry_attempts, self.config.retry_base_ms, || {
            let base_url = base_url.clone();
            let prompt = prompt.clone();
            async {
                let mut req = self.http.post(format!("{base_url}/judge")).json(&json!({
                    "prompt": prompt,
                    "model": self.config.model,
                }));
                if let Some(key) = &self.config.api_key {
                    req = req.bearer_auth(key);
                }
                let resp = req.send().await.map_err(|e| EmbeddingError::Transport(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(EmbeddingError::Transport(format!("status {}", resp.status())));
                }
                let body = resp.text().await.map_err(|e| EmbeddingError::Transport(e.to_string()))?;
                Ok(parse::parse_judge_reply(&body))
            }
        })
        .await;

        // Judge parse failures degrade to a conservative verdict rather than a
        // hard error (spec §7 "judge parse failure" policy); only transport
        // exhaustion propagates as an error.
        match result {
            Ok(v) => Ok(v),
            Err(EmbeddingError::JudgeParse) => Ok(JudgeVerdict::default()),
            Err(e) => Err(EmbeddingError::RetriesExhausted {
                attempts: self.config.retry_attempts,
                last_error: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_without_backend_is_deterministic_and_normalized() {
        let client = EmbeddingClient::new(HttpClientConfig::default());
        let a = client.embed("hello world").await.unwrap();
        let b = client.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[tokio::test]
    async fn judge_without_backend_defaults_to_no_match() {
        let client = EmbeddingClient::new(HttpClientConfig::default());
        let v = client.judge(ConditionKind::InvalidatesIf, "x", "y").await.unwrap();
        assert!(!v.matches);
        assert_eq!(v.confidence, 0.0);
    }

    #[tokio::test]
    async fn retry_with_backoff_succeeds_after_transient_failures() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_with_backoff(2, 1, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
    }
}
