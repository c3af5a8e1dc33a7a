//! The Vector Index Façade (C2, spec §4.2): three logical indexes (`MEMORY`,
//! `INVALIDATES`, `CONFIRMS`) behind the `VectorIndex` trait from `verity-core`.
//! No committed vector-DB client sits in the retrieval pack, so this is an
//! in-process implementation; the trait-seam / `Arc<...>`-shared-state idiom
//! follows the teacher's `GraphManager` (`cortex-causal::graph::GraphManager`).

use dashmap::DashMap;
use serde_json::Value;

use verity_core::errors::IndexError;
use verity_core::traits::{IndexFilter, IndexHit, IndexName, VectorIndex};

#[derive(Clone)]
struct Row {
    vector: Vec<f32>,
    meta: Value,
}

/// One logical index: id -> (vector, metadata).
#[derive(Default)]
struct LogicalIndex {
    rows: DashMap<String, Row>,
}

impl LogicalIndex {
    fn upsert(&self, id: &str, vector: Vec<f32>, meta: Value) {
        self.rows.insert(id.to_string(), Row { vector, meta });
    }

    fn delete(&self, ids: &[String]) {
        for id in ids {
            self.rows.remove(id);
        }
    }

    fn get(&self, ids: &[String]) -> Vec<IndexHit> {
        ids.iter()
            .filter_map(|id| {
                self.rows.get(id).map(|r| IndexHit {
                    id: id.clone(),
                    score: 1.0,
                    meta: r.meta.clone(),
                })
            })
            .collect()
    }

    fn query(&self, vector: &[f32], top_k: usize, min_sim: f32, filter: Option<&IndexFilter>) -> Vec<IndexHit> {
        let mut hits: Vec<IndexHit> = self
            .rows
            .iter()
            .filter(|entry| match &filter {
                Some(f) => match &f.memory_type {
                    Some(t) => entry.value().meta.get("type").and_then(|v| v.as_str()) == Some(t.as_str()),
                    None => true,
                },
                None => true,
            })
            .map(|entry| {
                let score = cosine_similarity(vector, &entry.value().vector);
                IndexHit {
                    id: entry.key().clone(),
                    score,
                    meta: entry.value().meta.clone(),
                }
            })
            .filter(|h| h.score >= min_sim)
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }
}

/// Cosine similarity; treated as `[0,1]` after min-similarity filtering per spec §4.2,
/// though the raw value is mathematically in `[-1,1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// In-process implementation of the three logical indexes named in spec §4.2.
#[derive(Default)]
pub struct InProcessVectorIndex {
    memory: LogicalIndex,
    invalidates: LogicalIndex,
    confirms: LogicalIndex,
}

impl InProcessVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_for(&self, index: IndexName) -> &LogicalIndex {
        match index {
            IndexName::Memory => &self.memory,
            IndexName::Invalidates => &self.invalidates,
            IndexName::Confirms => &self.confirms,
        }
    }
}

impl VectorIndex for InProcessVectorIndex {
    async fn upsert(&self, index: IndexName, id: &str, vector: Vec<f32>, meta: Value) -> Result<(), IndexError> {
        self.index_for(index).upsert(id, vector, meta);
        Ok(())
    }

    async fn query(
        &self,
        index: IndexName,
        vector: &[f32],
        top_k: usize,
        min_sim: f32,
        filter: Option<IndexFilter>,
    ) -> Result<Vec<IndexHit>, IndexError> {
        Ok(self.index_for(index).query(vector, top_k, min_sim, filter.as_ref()))
    }

    async fn delete_by_ids(&self, index: IndexName, ids: &[String]) -> Result<(), IndexError> {
        self.index_for(index).delete(ids);
        Ok(())
    }

    async fn get_by_ids(&self, index: IndexName, ids: &[String]) -> Result<Vec<IndexHit>, IndexError> {
        Ok(self.index_for(index).get(ids))
    }
}

/// Canonical condition-vector ids, per spec §4.2/§6.2.
pub fn invalidates_id(memory_id: &str, i: usize) -> String {
    format!("{memory_id}:inv:{i}")
}

pub fn confirms_id(memory_id: &str, i: usize) -> String {
    format!("{memory_id}:conf:{i}")
}

/// Given a condition-vector id of the canonical form `"{memory_id}:inv:{i}"` or
/// `"{memory_id}:conf:{i}"`, recover the owning memory id.
pub fn memory_id_from_condition_id(condition_id: &str) -> Option<&str> {
    condition_id.rsplit_once(":inv:").or_else(|| condition_id.rsplit_once(":conf:")).map(|(mid, _)| mid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn upsert_then_query_finds_the_row_above_threshold() {
        let idx = InProcessVectorIndex::new();
        idx.upsert(IndexName::Invalidates, "m1:inv:0", vec![1.0, 0.0], serde_json::json!({"memory_id":"m1"}))
            .await
            .unwrap();
        let hits = idx
            .query(IndexName::Invalidates, &[1.0, 0.0], 10, 0.5, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "m1:inv:0");
    }

    #[tokio::test]
    async fn delete_removes_from_future_queries() {
        let idx = InProcessVectorIndex::new();
        idx.upsert(IndexName::Memory, "m1", vec![1.0, 0.0], serde_json::json!({})).await.unwrap();
        idx.delete_by_ids(IndexName::Memory, &["m1".to_string()]).await.unwrap();
        let hits = idx.query(IndexName::Memory, &[1.0, 0.0], 10, 0.0, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn condition_id_roundtrip() {
        assert_eq!(invalidates_id("m1", 2), "m1:inv:2");
        assert_eq!(memory_id_from_condition_id("m1:inv:2"), Some("m1"));
        assert_eq!(memory_id_from_condition_id("m1:conf:0"), Some("m1"));
    }
}
