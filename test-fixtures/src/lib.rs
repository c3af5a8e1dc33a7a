//! Shared in-memory storage fixture + draft builders, referenced throughout this
//! workspace's own test suites. Grounded on the teacher's
//! `StorageEngine::open_in_memory()` fixture convention.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use verity_core::memory::{MemoryDraft, Source};
use verity_storage::StorageEngine;

/// An in-memory `StorageEngine`, fresh per call.
pub fn storage_fixture() -> StorageEngine {
    StorageEngine::open_in_memory().expect("in-memory sqlite should always open")
}

/// Builder for an observation draft.
pub fn observation(content: &str, source: Source) -> MemoryDraft {
    MemoryDraft {
        content: content.to_string(),
        source: Some(source),
        ..Default::default()
    }
}

/// Builder for a thought draft derived from one or more parents.
pub fn thought(content: &str, derived_from: &[&str]) -> MemoryDraft {
    MemoryDraft {
        content: content.to_string(),
        derived_from: derived_from.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Builder for a time-bound thought (prediction) draft.
pub fn prediction(
    content: &str,
    derived_from: &[&str],
    resolves_by: DateTime<Utc>,
    outcome_condition: &str,
) -> MemoryDraft {
    MemoryDraft {
        content: content.to_string(),
        derived_from: derived_from.iter().map(|s| s.to_string()).collect(),
        resolves_by: Some(resolves_by),
        outcome_condition: Some(outcome_condition.to_string()),
        ..Default::default()
    }
}

pub fn with_invalidates_if(mut draft: MemoryDraft, conditions: &[&str]) -> MemoryDraft {
    draft.invalidates_if = conditions.iter().map(|s| s.to_string()).collect();
    draft
}

pub fn with_confirms_if(mut draft: MemoryDraft, conditions: &[&str]) -> MemoryDraft {
    draft.confirms_if = conditions.iter().map(|s| s.to_string()).collect();
    draft
}

pub fn with_tags(mut draft: MemoryDraft, tags: &[&str]) -> MemoryDraft {
    draft.tags = tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
    draft
}
