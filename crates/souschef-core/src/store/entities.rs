// ── Graph Store: Entities ────────────────────────────────────────────────────
//
// find / upsert / delete-by-keys for the four vertex kinds.
// All methods follow the same pattern: &self, lock conn, rusqlite params.

use super::{now_timestamp, GraphStore};
use crate::atoms::constants::MAX_UPSERT_ATTEMPTS;
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{Entity, EntityKind, EntitySeed, StoreStats};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};

impl GraphStore {
    /// Exact (kind, key) lookup.
    pub fn find_entity(&self, kind: EntityKind, key: &str) -> EngineResult<Option<Entity>> {
        let conn = self.conn.lock();
        Ok(select_entity(&conn, kind, key)?)
    }

    /// Create-if-absent. The INSERT is a no-op when (kind, key) already
    /// exists, so the seed of the first writer wins and repeat calls return
    /// the stored record unchanged. If the row disappears between the insert
    /// and the read (a concurrent purge from another process) the attempt is
    /// repeated, up to `MAX_UPSERT_ATTEMPTS`.
    pub fn upsert_entity(
        &self,
        kind: EntityKind,
        key: &str,
        seed: &EntitySeed,
    ) -> EngineResult<Entity> {
        for attempt in 1..=MAX_UPSERT_ATTEMPTS {
            let conn = self.conn.lock();
            let id = uuid::Uuid::new_v4().to_string();
            let inserted = conn.execute(
                "INSERT INTO entities (id, kind, key, title, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (kind, key) DO NOTHING",
                params![
                    id,
                    kind.as_str(),
                    key,
                    seed.title.as_deref().map(str::trim),
                    seed.detail,
                    now_timestamp(),
                ],
            )?;

            if let Some(entity) = select_entity(&conn, kind, key)? {
                if inserted > 0 {
                    info!("[store] New {}: {}", kind, key);
                } else {
                    debug!("[store] Reusing existing {}: {}", kind, key);
                }
                return Ok(entity);
            }

            warn!(
                "[store] {} '{}' vanished during upsert (attempt {}/{})",
                kind, key, attempt, MAX_UPSERT_ATTEMPTS
            );
        }

        Err(EngineError::conflict(kind.as_str(), key))
    }

    /// Delete the entities of `kind` with the given canonical keys, plus every
    /// relation touching them. Returns how many entities were removed.
    pub fn delete_entities(&self, kind: EntityKind, keys: &[String]) -> EngineResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0usize;

        for key in keys {
            let id: Option<String> = tx
                .query_row(
                    "SELECT id FROM entities WHERE kind = ?1 AND key = ?2",
                    params![kind.as_str(), key],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(id) = id else {
                debug!("[store] Nothing to delete for {} '{}'", kind, key);
                continue;
            };

            tx.execute(
                "DELETE FROM relations WHERE source_id = ?1 OR target_id = ?1",
                params![id],
            )?;
            removed += tx.execute("DELETE FROM entities WHERE id = ?1", params![id])?;
            info!("[store] Deleted {} '{}'", kind, key);
        }

        tx.commit()?;
        Ok(removed)
    }

    /// Entity counts per kind and total relations.
    pub fn stats(&self) -> EngineResult<StoreStats> {
        let conn = self.conn.lock();
        let count_kind = |kind: EntityKind| -> rusqlite::Result<usize> {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entities WHERE kind = ?1",
                params![kind.as_str()],
                |r| r.get(0),
            )?;
            Ok(n as usize)
        };

        let relations: i64 = conn.query_row("SELECT COUNT(*) FROM relations", [], |r| r.get(0))?;

        Ok(StoreStats {
            users: count_kind(EntityKind::User)?,
            ingredients: count_kind(EntityKind::Ingredient)?,
            cuisines: count_kind(EntityKind::Cuisine)?,
            recipes: count_kind(EntityKind::Recipe)?,
            relations: relations as usize,
        })
    }
}

// ── Row helpers ──────────────────────────────────────────────────────────────

pub(super) fn select_entity(
    conn: &Connection,
    kind: EntityKind,
    key: &str,
) -> rusqlite::Result<Option<Entity>> {
    conn.query_row(
        "SELECT id, kind, key, title, detail, created_at
         FROM entities WHERE kind = ?1 AND key = ?2",
        params![kind.as_str(), key],
        entity_from_row,
    )
    .optional()
}

pub(super) fn entity_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
    let kind_str: String = row.get(1)?;
    let kind = kind_str.parse::<EntityKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            Box::new(EngineError::Other(e)),
        )
    })?;

    Ok(Entity {
        id: row.get(0)?,
        kind,
        key: row.get(2)?,
        title: row.get(3)?,
        detail: row.get(4)?,
        created_at: row.get(5)?,
    })
}
