//! Schema migrations. Grounded on `cortex-storage/src/migrations/mod.rs`'s
//! version-tracking runner (transaction-per-migration, tracing at each step),
//! DDL rewritten for this spec's logical tables (§6.6).

use rusqlite::Connection;
use tracing::info;

use verity_core::errors::StorageError;

type Migration = (i64, &'static str);

const MIGRATIONS: &[Migration] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id                      TEXT PRIMARY KEY,
            content                 TEXT NOT NULL,
            tags_json               TEXT NOT NULL,
            source                  TEXT,
            derived_from_json       TEXT NOT NULL,
            invalidates_if_json     TEXT NOT NULL,
            confirms_if_json        TEXT NOT NULL,
            assumes_json            TEXT NOT NULL,
            resolves_by             INTEGER,
            outcome_condition       TEXT,
            starting_confidence     REAL NOT NULL,
            confirmations           INTEGER NOT NULL DEFAULT 0,
            times_tested            INTEGER NOT NULL DEFAULT 0,
            contradictions          INTEGER NOT NULL DEFAULT 0,
            centrality              INTEGER NOT NULL DEFAULT 0,
            propagated_confidence   REAL,
            state                   TEXT NOT NULL,
            outcome                 TEXT,
            retracted               INTEGER NOT NULL DEFAULT 0,
            retraction_reason       TEXT,
            exposure_check_status   TEXT NOT NULL,
            violations_json         TEXT NOT NULL,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL,
            resolved_at             TEXT,
            retracted_at            TEXT,
            session_id              TEXT
        );

        CREATE TABLE IF NOT EXISTS edges (
            source_id   TEXT NOT NULL,
            target_id   TEXT NOT NULL,
            edge_type   TEXT NOT NULL,
            strength    REAL NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (source_id, target_id, edge_type)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);

        CREATE TABLE IF NOT EXISTS memory_events (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id       TEXT NOT NULL,
            entity_type     TEXT NOT NULL,
            change_type     TEXT NOT NULL,
            snapshot_json   TEXT NOT NULL,
            change_reason   TEXT,
            session_id      TEXT,
            request_id      TEXT,
            at              TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_events_entity ON memory_events(entity_id);

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            kind        TEXT NOT NULL,
            memory_id   TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memory_access (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            memory_id   TEXT NOT NULL,
            at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS system_stats (
            key     TEXT PRIMARY KEY,
            value   REAL NOT NULL
        );
        "#,
    ),
    (
        2,
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id              TEXT PRIMARY KEY,
            session_id      TEXT,
            event_type      TEXT NOT NULL,
            memory_id       TEXT NOT NULL,
            violated_by     TEXT,
            damage_level    TEXT,
            context_json    TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            dispatched      INTEGER NOT NULL DEFAULT 0,
            dispatched_at   TEXT,
            claim_id        TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_events_session_dispatched ON events(session_id, dispatched);
        CREATE INDEX IF NOT EXISTS idx_events_memory ON events(memory_id);
        "#,
    ),
];

pub fn run(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let current: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
        .unwrap_or(0);

    for (version, ddl) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        info!(version, "applying storage migration");
        conn.execute_batch(ddl)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    }

    Ok(())
}
