// ── SousChef Atoms: Constants ──────────────────────────────────────────────

/// Number of recipe candidates offered per search, and the upper bound for
/// a valid numeric selection.
pub const MAX_RECIPES: usize = 5;

/// Bounded create-if-absent attempts before an upsert gives up with
/// `EngineError::Conflict`.
pub const MAX_UPSERT_ATTEMPTS: u32 = 3;

/// Label stored on every relation row. The graph only has one edge type.
pub const RELATION_LABEL: &str = "selects";

/// Entity kind tag used in the classifier's entity list for cuisines.
pub const CUISINE_ENTITY: &str = "cuisine";

/// Timestamp format used for `created_at` / `updated_at` columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
