// SousChef: Graph Store
// Entities (users, ingredients, cuisines, recipes) and weighted "selects"
// relations in SQLite via rusqlite. One connection behind a Mutex; every
// method locks, runs its statements, and releases.
//
// Module layout:
//   schema     - idempotent migrations
//   entities   - find / upsert / delete-by-keys / stats
//   relations  - record / get / rank / recommend

use crate::atoms::error::EngineResult;
use crate::atoms::traits::EntityStore;
use crate::atoms::types::{Entity, EntityKind, EntitySeed, RankedEntity, Relation};
use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

mod entities;
mod relations;
mod schema;

/// Thread-safe database wrapper implementing `EntityStore`.
pub struct GraphStore {
    conn: Mutex<Connection>,
}

impl GraphStore {
    /// Open (or create) the store at `path` and run migrations.
    pub fn open(path: &Path) -> EngineResult<Self> {
        info!("[store] Opening graph store at {:?}", path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        // Concurrent processes sharing the file wait instead of failing fast.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        schema::run_migrations(&conn)?;

        Ok(GraphStore { conn: Mutex::new(conn) })
    }

    /// A private in-memory store with the full schema.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(GraphStore { conn: Mutex::new(conn) })
    }
}

impl EntityStore for GraphStore {
    fn find_by_key(&self, kind: EntityKind, key: &str) -> EngineResult<Option<Entity>> {
        self.find_entity(kind, key)
    }

    fn upsert(&self, kind: EntityKind, key: &str, seed: EntitySeed) -> EngineResult<Entity> {
        self.upsert_entity(kind, key, &seed)
    }

    fn record_relation(&self, source_id: &str, target_id: &str) -> EngineResult<Relation> {
        self.bump_relation(source_id, target_id)
    }

    fn get_relation(&self, source_id: &str, target_id: &str) -> EngineResult<Option<Relation>> {
        self.find_relation(source_id, target_id)
    }

    fn rank_relations_by_target(
        &self,
        source_id: &str,
        target_kind: EntityKind,
        limit: usize,
    ) -> EngineResult<Vec<RankedEntity>> {
        self.ranked_targets(source_id, target_kind, limit)
    }

    fn find_recommended_for(
        &self,
        anchor_key: &str,
        anchor_kind: EntityKind,
        excluding_user: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<RankedEntity>> {
        self.recommended_recipes(anchor_key, anchor_kind, excluding_user, limit)
    }

    fn delete_by_keys(&self, kind: EntityKind, keys: &[String]) -> EngineResult<usize> {
        self.delete_entities(kind, keys)
    }
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format(crate::atoms::constants::TIMESTAMP_FORMAT)
        .to_string()
}
