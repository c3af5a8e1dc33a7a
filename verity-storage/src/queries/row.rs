//! Row <-> domain-type mapping for the `memories` table. Grounded on
//! `cortex-storage/src/queries/memory_crud.rs`'s row-parsing idiom.

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Row;
use std::collections::BTreeSet;

use verity_core::errors::StorageError;
use verity_core::memory::{
    DamageLevel, ExposureCheckStatus, Memory, MemoryState, Outcome, Source, Violation,
    ViolationSource,
};

pub fn to_storage_err(e: impl ToString) -> StorageError {
    StorageError::Concurrency(e.to_string())
}

fn parse_source(s: Option<String>) -> Option<Source> {
    s.and_then(|s| match s.as_str() {
        "market" => Some(Source::Market),
        "news" => Some(Source::News),
        "earnings" => Some(Source::Earnings),
        "email" => Some(Source::Email),
        "human" => Some(Source::Human),
        "tool" => Some(Source::Tool),
        _ => None,
    })
}

pub fn source_to_str(s: Source) -> &'static str {
    s.as_str()
}

fn parse_state(s: &str) -> MemoryState {
    match s {
        "confirmed" => MemoryState::Confirmed,
        "violated" => MemoryState::Violated,
        "resolved" => MemoryState::Resolved,
        _ => MemoryState::Active,
    }
}

pub fn state_to_str(s: MemoryState) -> &'static str {
    match s {
        MemoryState::Active => "active",
        MemoryState::Confirmed => "confirmed",
        MemoryState::Violated => "violated",
        MemoryState::Resolved => "resolved",
    }
}

fn parse_outcome(s: Option<String>) -> Option<Outcome> {
    s.and_then(|s| match s.as_str() {
        "correct" => Some(Outcome::Correct),
        "incorrect" => Some(Outcome::Incorrect),
        "void" => Some(Outcome::Void),
        "superseded" => Some(Outcome::Superseded),
        _ => None,
    })
}

pub fn outcome_to_str(o: Outcome) -> &'static str {
    match o {
        Outcome::Correct => "correct",
        Outcome::Incorrect => "incorrect",
        Outcome::Void => "void",
        Outcome::Superseded => "superseded",
    }
}

fn parse_exposure_status(s: &str) -> ExposureCheckStatus {
    match s {
        "processing" => ExposureCheckStatus::Processing,
        "completed" => ExposureCheckStatus::Completed,
        "skipped" => ExposureCheckStatus::Skipped,
        _ => ExposureCheckStatus::Pending,
    }
}

pub fn exposure_status_to_str(s: ExposureCheckStatus) -> &'static str {
    match s {
        ExposureCheckStatus::Pending => "pending",
        ExposureCheckStatus::Processing => "processing",
        ExposureCheckStatus::Completed => "completed",
        ExposureCheckStatus::Skipped => "skipped",
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|s| parse_ts(&s))
}

pub fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get("tags_json")?;
    let tags: BTreeSet<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let derived_from_json: String = row.get("derived_from_json")?;
    let derived_from: Vec<String> = serde_json::from_str(&derived_from_json).unwrap_or_default();
    let invalidates_if_json: String = row.get("invalidates_if_json")?;
    let invalidates_if: Vec<String> = serde_json::from_str(&invalidates_if_json).unwrap_or_default();
    let confirms_if_json: String = row.get("confirms_if_json")?;
    let confirms_if: Vec<String> = serde_json::from_str(&confirms_if_json).unwrap_or_default();
    let assumes_json: String = row.get("assumes_json")?;
    let assumes: Vec<String> = serde_json::from_str(&assumes_json).unwrap_or_default();
    let violations_json: String = row.get("violations_json")?;
    let violations: Vec<Violation> = serde_json::from_str(&violations_json).unwrap_or_default();

    let resolves_by: Option<i64> = row.get("resolves_by")?;
    let resolves_by = resolves_by.map(|ms| Utc.timestamp_millis_opt(ms).unwrap());

    Ok(Memory {
        id: row.get("id")?,
        content: row.get("content")?,
        tags,
        source: parse_source(row.get("source")?),
        derived_from,
        invalidates_if,
        confirms_if,
        assumes,
        resolves_by,
        outcome_condition: row.get("outcome_condition")?,
        starting_confidence: row.get("starting_confidence")?,
        confirmations: row.get::<_, i64>("confirmations")? as u32,
        times_tested: row.get::<_, i64>("times_tested")? as u32,
        contradictions: row.get::<_, i64>("contradictions")? as u32,
        centrality: row.get::<_, i64>("centrality")? as u32,
        propagated_confidence: row.get("propagated_confidence")?,
        state: parse_state(&row.get::<_, String>("state")?),
        outcome: parse_outcome(row.get("outcome")?),
        retracted: row.get::<_, i64>("retracted")? != 0,
        retraction_reason: row.get("retraction_reason")?,
        exposure_check_status: parse_exposure_status(&row.get::<_, String>("exposure_check_status")?),
        violations,
        created_at: parse_ts(&row.get::<_, String>("created_at")?),
        updated_at: parse_ts(&row.get::<_, String>("updated_at")?),
        resolved_at: parse_ts_opt(row.get("resolved_at")?),
        retracted_at: parse_ts_opt(row.get("retracted_at")?),
        session_id: row.get("session_id")?,
    })
}

pub fn violation_source_to_str(s: ViolationSource) -> &'static str {
    match s {
        ViolationSource::Direct => "direct",
        ViolationSource::Cascade => "cascade",
    }
}

pub fn damage_level_to_str(d: DamageLevel) -> &'static str {
    match d {
        DamageLevel::Core => "core",
        DamageLevel::Peripheral => "peripheral",
    }
}
