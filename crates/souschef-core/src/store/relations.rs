// ── Graph Store: Relations ───────────────────────────────────────────────────
//
// Weighted "selects" edges between entities. One row per ordered pair; the
// insert-or-increment is a single statement so two racing turns can never
// produce a duplicate edge or lose an increment.

use super::entities::{entity_from_row, select_entity};
use super::{now_timestamp, GraphStore};
use crate::atoms::constants::RELATION_LABEL;
use crate::atoms::error::EngineResult;
use crate::atoms::types::{EntityKind, RankedEntity, Relation};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

impl GraphStore {
    /// Create the edge with count 1, or add one to its count.
    pub fn bump_relation(&self, source_id: &str, target_id: &str) -> EngineResult<Relation> {
        let conn = self.conn.lock();
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO relations (source_id, target_id, label, count, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)
             ON CONFLICT (source_id, target_id)
             DO UPDATE SET count = count + 1, updated_at = excluded.updated_at",
            params![source_id, target_id, RELATION_LABEL, now],
        )?;

        let relation = select_relation(&conn, source_id, target_id)?.ok_or_else(|| {
            rusqlite::Error::QueryReturnedNoRows
        })?;
        debug!(
            "[store] Relation {} -> {} now at {}",
            source_id, target_id, relation.count
        );
        Ok(relation)
    }

    pub fn find_relation(&self, source_id: &str, target_id: &str) -> EngineResult<Option<Relation>> {
        let conn = self.conn.lock();
        Ok(select_relation(&conn, source_id, target_id)?)
    }

    /// Targets of `source_id` of the given kind, strongest edge first.
    /// Equal counts keep edge creation order.
    pub fn ranked_targets(
        &self,
        source_id: &str,
        target_kind: EntityKind,
        limit: usize,
    ) -> EngineResult<Vec<RankedEntity>> {
        let conn = self.conn.lock();
        Ok(query_ranked(&conn, source_id, target_kind, limit)?)
    }

    /// Recipes reached from the anchor ingredient/cuisine, ranked by how
    /// often they were chosen after it. Unknown anchor → empty list.
    pub fn recommended_recipes(
        &self,
        anchor_key: &str,
        anchor_kind: EntityKind,
        excluding_user: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<RankedEntity>> {
        let conn = self.conn.lock();
        let Some(anchor) = select_entity(&conn, anchor_kind, anchor_key)? else {
            debug!("[store] No {} '{}' yet, nothing to recommend", anchor_kind, anchor_key);
            return Ok(Vec::new());
        };

        // Anchor→recipe counts aggregate every user's choices, so there is
        // no per-user edge to subtract here.
        if let Some(user) = excluding_user {
            debug!("[store] Recommendation requested on behalf of {}", user);
        }

        let ranked = query_ranked(&conn, &anchor.id, EntityKind::Recipe, limit)?;
        info!(
            "[store] {} recommended recipe(s) for {} '{}'",
            ranked.len(),
            anchor_kind,
            anchor_key
        );
        Ok(ranked)
    }
}

fn select_relation(
    conn: &Connection,
    source_id: &str,
    target_id: &str,
) -> rusqlite::Result<Option<Relation>> {
    conn.query_row(
        "SELECT source_id, target_id, count, created_at, updated_at
         FROM relations WHERE source_id = ?1 AND target_id = ?2",
        params![source_id, target_id],
        |row| {
            Ok(Relation {
                source_id: row.get(0)?,
                target_id: row.get(1)?,
                count: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
}

fn query_ranked(
    conn: &Connection,
    source_id: &str,
    target_kind: EntityKind,
    limit: usize,
) -> rusqlite::Result<Vec<RankedEntity>> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.kind, e.key, e.title, e.detail, e.created_at, r.count
         FROM relations r
         JOIN entities e ON e.id = r.target_id
         WHERE r.source_id = ?1 AND e.kind = ?2
         ORDER BY r.count DESC, r.seq ASC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![source_id, target_kind.as_str(), limit as i64], |row| {
        Ok(RankedEntity {
            entity: entity_from_row(row)?,
            count: row.get(6)?,
        })
    })?;

    rows.collect()
}
