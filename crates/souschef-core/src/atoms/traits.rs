// ── SousChef Atoms: Collaborator Traits ────────────────────────────────────
// The seams of the system. The dialogue controller only ever talks to these
// traits, so the backing store and each external service can be swapped
// (SQLite vs. a graph database, a live API vs. a scripted fake in tests).

use crate::atoms::error::EngineResult;
use crate::atoms::types::{
    Classification, ConversationContext, Entity, EntityKind, EntitySeed, Notification,
    RankedEntity, RecipeInfo, RecipeStep, RecipeSummary, Relation,
};
use async_trait::async_trait;

// ── Entity store ───────────────────────────────────────────────────────────

/// Canonical, deduplicated storage of entities and weighted relations.
///
/// Every method may fail with `EngineError::StoreUnavailable`; callers treat
/// that as fatal for the current turn. Keys passed in are already canonical
/// (see `EntityKind::canonical_key`).
pub trait EntityStore: Send + Sync {
    /// Exact lookup by (kind, key).
    fn find_by_key(&self, kind: EntityKind, key: &str) -> EngineResult<Option<Entity>>;

    /// Return the existing entity for (kind, key) untouched, or create it
    /// with `seed`. Concurrent callers racing on one key observe one record.
    fn upsert(&self, kind: EntityKind, key: &str, seed: EntitySeed) -> EngineResult<Entity>;

    /// Create the (source, target) edge with count 1, or bump its count.
    /// Never creates a second edge for the same ordered pair.
    fn record_relation(&self, source_id: &str, target_id: &str) -> EngineResult<Relation>;

    /// Look up the edge for an ordered pair.
    fn get_relation(&self, source_id: &str, target_id: &str) -> EngineResult<Option<Relation>>;

    /// Outgoing edges of `source_id` whose target is `target_kind`, by count
    /// descending, ties by edge creation order (oldest first).
    fn rank_relations_by_target(
        &self,
        source_id: &str,
        target_kind: EntityKind,
        limit: usize,
    ) -> EngineResult<Vec<RankedEntity>>;

    /// Recipes most often chosen by anyone after the given ingredient/cuisine.
    /// An unknown anchor yields an empty list.
    fn find_recommended_for(
        &self,
        anchor_key: &str,
        anchor_kind: EntityKind,
        excluding_user: Option<&str>,
        limit: usize,
    ) -> EngineResult<Vec<RankedEntity>>;

    /// Administrative bulk delete. Returns the number of entities removed.
    fn delete_by_keys(&self, kind: EntityKind, keys: &[String]) -> EngineResult<usize>;
}

// ── Recipe catalog ─────────────────────────────────────────────────────────

#[async_trait]
pub trait RecipeCatalog: Send + Sync {
    async fn search_by_ingredients(&self, text: &str) -> EngineResult<Vec<RecipeSummary>>;

    async fn search_by_cuisine(&self, text: &str) -> EngineResult<Vec<RecipeSummary>>;

    async fn get_recipe_info(&self, id: &str) -> EngineResult<RecipeInfo>;

    async fn get_recipe_steps(&self, id: &str) -> EngineResult<Vec<RecipeStep>>;
}

// ── Classifier ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Map free text to intent flags, entities and reply text. `context` is
    /// the blob returned by the previous call for this user.
    async fn classify(
        &self,
        user_id: &str,
        text: &str,
        context: &ConversationContext,
    ) -> EngineResult<Classification>;
}

// ── Notification sink ──────────────────────────────────────────────────────

/// Fire-and-forget event log. Implementations must not block the caller and
/// must swallow their own delivery failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink used when no notification endpoint is configured.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _notification: Notification) {}
}
