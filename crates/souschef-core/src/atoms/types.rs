// ── SousChef Atoms: Value Types ────────────────────────────────────────────
// Entities and relations as the store hands them out, plus the data shapes
// exchanged with the classifier, catalog and notification collaborators.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════════
// Entities
// ═══════════════════════════════════════════════════════════════════════════

/// The four kinds of vertex in the recommendation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Ingredient,
    Cuisine,
    Recipe,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::User,
        EntityKind::Ingredient,
        EntityKind::Cuisine,
        EntityKind::Recipe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Ingredient => "ingredient",
            EntityKind::Cuisine => "cuisine",
            EntityKind::Recipe => "recipe",
        }
    }

    /// Normalise raw user/catalog text into the canonical key for this kind.
    ///
    /// - user: opaque, used verbatim
    /// - ingredient: lower-cased, comma-split, trimmed, sorted, re-joined
    /// - cuisine / recipe: lower-cased and trimmed
    pub fn canonical_key(&self, raw: &str) -> String {
        match self {
            EntityKind::User => raw.to_string(),
            EntityKind::Ingredient => canonical_ingredients(raw),
            EntityKind::Cuisine | EntityKind::Recipe => raw.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(EntityKind::User),
            "ingredient" => Ok(EntityKind::Ingredient),
            "cuisine" => Ok(EntityKind::Cuisine),
            "recipe" => Ok(EntityKind::Recipe),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// `"Beef, Onion"` and `"onion,beef"` both become `"beef,onion"`.
fn canonical_ingredients(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mut parts: Vec<&str> = lower
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    parts.sort_unstable();
    parts.join(",")
}

/// A stored vertex. The (kind, key) pair is unique; `detail` is written once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub key: String,
    /// Display title (recipes only).
    pub title: Option<String>,
    /// Cached catalog payload: search results JSON for ingredients/cuisines,
    /// formatted instructions for recipes.
    pub detail: Option<String>,
    pub created_at: String,
}

/// Initial mutable detail handed to `upsert`. Ignored when the entity exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySeed {
    pub title: Option<String>,
    pub detail: Option<String>,
}

impl EntitySeed {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn detail(detail: impl Into<String>) -> Self {
        Self { title: None, detail: Some(detail.into()) }
    }

    pub fn recipe(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { title: Some(title.into()), detail: Some(detail.into()) }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Relations
// ═══════════════════════════════════════════════════════════════════════════

/// A directed "selects" edge. Unique per (source_id, target_id); `count >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    pub count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A relation target with the observed count of the edge leading to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntity {
    pub entity: Entity,
    pub count: i64,
}

/// Entity counts per kind plus the number of relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub ingredients: usize,
    pub cuisines: usize,
    pub recipes: usize,
    pub relations: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// Catalog shapes
// ═══════════════════════════════════════════════════════════════════════════

/// One search hit from the recipe catalog. This is also the element type of
/// the JSON array cached as ingredient/cuisine detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSummary {
    #[serde(deserialize_with = "de_recipe_id")]
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInfo {
    pub title: String,
    pub servings: u32,
    #[serde(rename = "readyInMinutes")]
    pub ready_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub equipment: Vec<String>,
    pub action: String,
}

/// Catalog ids arrive as JSON numbers; cached detail may hold strings.
fn de_recipe_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Float(f) => (f as i64).to_string(),
        RawId::Text(s) => s,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Classifier shapes
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque context blob round-tripped through the classifier. The controller
/// stores it per user and never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext(Option<String>);

impl ConversationContext {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(Some(raw.into()))
    }

    pub fn as_raw(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFlags {
    pub favorites: bool,
    pub ingredients: bool,
    pub selection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedEntity {
    pub kind: String,
    pub value: String,
}

/// The classifier's verdict on one inbound turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub intents: IntentFlags,
    /// Ordered as the classifier reported them.
    pub entities: Vec<DetectedEntity>,
    /// Greeting/help text to emit verbatim on the start path.
    pub reply_text: String,
    /// The next context blob for this user.
    pub context: ConversationContext,
    /// Parsed selection number, when the classifier extracted one.
    pub selection: Option<i64>,
}

impl Classification {
    /// Value of the first entity of the given kind (case-insensitive).
    pub fn entity(&self, kind: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.kind.eq_ignore_ascii_case(kind))
            .map(|e| e.value.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAction {
    Start,
    Favorites,
    Ingredient,
    Cuisine,
    Recipe,
}

/// One fire-and-forget event for the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub action: NotifyAction,
    pub message: String,
    pub user: String,
    /// Anchor ingredient key, empty when the anchor is not an ingredient.
    pub ingredient: String,
    /// Anchor cuisine key, empty when the anchor is not a cuisine.
    pub cuisine: String,
    pub recipe: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingredient_keys_ignore_case_order_and_spacing() {
        let a = EntityKind::Ingredient.canonical_key("Beef, Onion");
        let b = EntityKind::Ingredient.canonical_key("onion,beef");
        assert_eq!(a, "beef,onion");
        assert_eq!(a, b);
    }

    #[test]
    fn ingredient_keys_drop_empty_segments() {
        assert_eq!(EntityKind::Ingredient.canonical_key(" rice,, Chicken ,"), "chicken,rice");
    }

    #[test]
    fn cuisine_and_recipe_keys_trim_and_lowercase() {
        assert_eq!(EntityKind::Cuisine.canonical_key("  Italian "), "italian");
        assert_eq!(EntityKind::Recipe.canonical_key(" 716429 "), "716429");
    }

    #[test]
    fn user_keys_are_opaque() {
        assert_eq!(EntityKind::User.canonical_key("U2JBLUPL2"), "U2JBLUPL2");
    }

    #[test]
    fn entity_kind_parses_case_insensitively() {
        assert_eq!(" User ".parse::<EntityKind>().unwrap(), EntityKind::User);
        assert!("person".parse::<EntityKind>().is_err());
        assert_eq!("Recipe".parse::<EntityKind>().unwrap(), EntityKind::Recipe);
        assert!("vertex".parse::<EntityKind>().is_err());
    }

    #[test]
    fn recipe_summary_accepts_numeric_ids() {
        let hits: Vec<RecipeSummary> =
            serde_json::from_str(r#"[{"id": 163864, "title": "Beef Stew"}, {"id": "abc", "title": "X"}]"#)
                .unwrap();
        assert_eq!(hits[0].id, "163864");
        assert_eq!(hits[1].id, "abc");
    }

    #[test]
    fn recipe_summary_roundtrips_through_cached_detail() {
        let hits = vec![RecipeSummary { id: "42".into(), title: "Soup".into() }];
        let json = serde_json::to_string(&hits).unwrap();
        let back: Vec<RecipeSummary> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hits);
    }

    #[test]
    fn classification_entity_lookup_is_case_insensitive() {
        let c = Classification {
            entities: vec![
                DetectedEntity { kind: "meal".into(), value: "dinner".into() },
                DetectedEntity { kind: "Cuisine".into(), value: "thai".into() },
            ],
            ..Default::default()
        };
        assert_eq!(c.entity("cuisine"), Some("thai"));
        assert_eq!(c.entity("ingredient"), None);
    }
}
