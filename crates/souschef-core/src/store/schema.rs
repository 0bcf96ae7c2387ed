// Database schema and migrations for the graph store.
// Called once by GraphStore::open() after WAL is enabled.
// Adding a new table or column: append an idempotent CREATE TABLE IF NOT EXISTS
// or ALTER TABLE … ADD COLUMN at the end of run_migrations(); never modify
// existing SQL to keep upgrade paths clean.

use crate::atoms::error::EngineResult;
use log::debug;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> EngineResult<()> {
    // ── Vertices ─────────────────────────────────────────────────────
    // (kind, key) is the canonical identity; UNIQUE makes create-if-absent
    // atomic at the storage layer.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            key TEXT NOT NULL,
            title TEXT,
            detail TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (kind, key)
        );

        CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);
        ",
    )?;

    // ── Edges ────────────────────────────────────────────────────────
    // seq records creation order and breaks ranking ties.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS relations (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            label TEXT NOT NULL DEFAULT 'selects',
            count INTEGER NOT NULL DEFAULT 1 CHECK (count >= 1),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (source_id, target_id)
        );

        CREATE INDEX IF NOT EXISTS idx_relations_source
            ON relations(source_id, count DESC, seq);
        CREATE INDEX IF NOT EXISTS idx_relations_target
            ON relations(target_id);
        ",
    )?;

    debug!("[store] Migrations complete");
    Ok(())
}
