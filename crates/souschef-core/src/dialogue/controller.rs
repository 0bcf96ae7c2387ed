// ── Dialogue: Controller ─────────────────────────────────────────────────────
//
// One inbound turn: lock the user's session, classify the text, dispatch to
// exactly one handler, commit the new session. Handlers work on a copy of
// the session so a failing store or upstream call leaves the committed
// state exactly as it was. Notifications go out only after the commit.
//
// Handler priority (first match wins):
//   favorites intent → ingredients intent → cuisine entity → selection intent
//   → start

use super::merge::{catalog_candidates, merge_candidates};
use super::reply;
use super::sessions::SessionStore;
use super::state::{RecipeCandidate, UserSession};
use crate::atoms::constants::{CUISINE_ENTITY, MAX_RECIPES};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::{Classifier, EntityStore, NotificationSink, RecipeCatalog};
use crate::atoms::types::{
    Classification, ConversationContext, Entity, EntityKind, EntitySeed, Notification,
    NotifyAction, RecipeSummary,
};
use log::{debug, info, warn};
use std::sync::Arc;

pub struct DialogueController {
    store: Arc<dyn EntityStore>,
    catalog: Arc<dyn RecipeCatalog>,
    classifier: Arc<dyn Classifier>,
    notifier: Arc<dyn NotificationSink>,
    sessions: Arc<dyn SessionStore>,
    max_recipes: usize,
}

/// Result of one handler: the reply plus the events to publish on commit.
struct TurnOutcome {
    reply: String,
    notifications: Vec<Notification>,
}

impl TurnOutcome {
    fn reply(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), notifications: Vec::new() }
    }

    fn with(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }
}

impl DialogueController {
    pub fn new(
        store: Arc<dyn EntityStore>,
        catalog: Arc<dyn RecipeCatalog>,
        classifier: Arc<dyn Classifier>,
        notifier: Arc<dyn NotificationSink>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            store,
            catalog,
            classifier,
            notifier,
            sessions,
            max_recipes: MAX_RECIPES,
        }
    }

    /// Override the candidate list length (at least 1).
    pub fn with_max_recipes(mut self, max_recipes: usize) -> Self {
        self.max_recipes = max_recipes.max(1);
        self
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Process one inbound message and return the reply text.
    ///
    /// On `Err` nothing about the user's session has changed; the transport
    /// decides what (if anything) to tell the user.
    pub async fn handle_turn(&self, user_id: &str, raw_text: &str) -> EngineResult<String> {
        let mut guard = self.sessions.lock(user_id).await;
        let mut working = guard.clone();

        let classification = self
            .classifier
            .classify(user_id, raw_text, &working.context)
            .await?;
        working.context = classification.context.clone();

        let outcome = match self.apply(user_id, &mut working, &classification, raw_text).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[dialogue] Turn for {} dropped: {}", user_id, e);
                return Err(e);
            }
        };

        *guard = working;
        drop(guard);

        for notification in outcome.notifications {
            self.notifier.notify(notification);
        }
        Ok(outcome.reply)
    }

    async fn apply(
        &self,
        user_id: &str,
        session: &mut UserSession,
        classification: &Classification,
        raw_text: &str,
    ) -> EngineResult<TurnOutcome> {
        let user = self.ensure_user(user_id, session)?;
        let intents = classification.intents;

        if intents.favorites {
            debug!("[dialogue] {} → favorites", user_id);
            self.handle_favorites(&user, session)
        } else if intents.ingredients {
            debug!("[dialogue] {} → ingredients '{}'", user_id, raw_text);
            self.handle_search(&user, session, EntityKind::Ingredient, raw_text, classification)
                .await
        } else if let Some(cuisine) = classification.entity(CUISINE_ENTITY) {
            debug!("[dialogue] {} → cuisine '{}'", user_id, cuisine);
            self.handle_search(&user, session, EntityKind::Cuisine, cuisine, classification)
                .await
        } else if intents.selection {
            let index = classification
                .selection
                .unwrap_or_else(|| raw_text.trim().parse::<i64>().unwrap_or(-1));
            debug!("[dialogue] {} → selection {}", user_id, index);
            self.handle_selection(&user, session, index).await
        } else {
            Ok(self.handle_start(&user, session, classification))
        }
    }

    /// The user's entity. Upserted every turn so a purged user comes back
    /// with a fresh id instead of leaving edges on a deleted one.
    fn ensure_user(&self, user_id: &str, session: &mut UserSession) -> EngineResult<Entity> {
        let key = EntityKind::User.canonical_key(user_id);
        let user = self.store.upsert(EntityKind::User, &key, EntitySeed::empty())?;
        session.state.user = Some(user.clone());
        Ok(user)
    }

    // ── Handlers ─────────────────────────────────────────────────────────

    fn handle_start(
        &self,
        user: &Entity,
        session: &mut UserSession,
        classification: &Classification,
    ) -> TurnOutcome {
        let mut outcome = TurnOutcome::reply(classification.reply_text.clone());
        if !session.state.conversation_started {
            session.state.conversation_started = true;
            info!("[dialogue] {} started a conversation", user.key);
            outcome = outcome.with(self.notification(
                NotifyAction::Start,
                format!("{} started a new conversation.", user.key),
                session,
                None,
            ));
        }
        outcome
    }

    fn handle_favorites(&self, user: &Entity, session: &mut UserSession) -> EngineResult<TurnOutcome> {
        let favorites =
            self.store
                .rank_relations_by_target(&user.id, EntityKind::Recipe, self.max_recipes)?;

        let candidates: Vec<RecipeCandidate> = merge_candidates(&favorites, &[], self.max_recipes)
            .into_iter()
            .map(|c| RecipeCandidate { recommended: false, ..c })
            .collect();
        session.state.await_selection(None, candidates);

        let text = if session.state.pending.is_empty() {
            reply::NO_FAVORITES.to_string()
        } else {
            reply::recipe_list(&session.state.pending)
        };
        let notification = self.notification(
            NotifyAction::Favorites,
            format!("{} requested their favorite recipes.", user.key),
            session,
            None,
        );
        Ok(TurnOutcome::reply(text).with(notification))
    }

    /// Shared by the ingredient and cuisine paths: reuse the anchor and its
    /// cached catalog results when known, otherwise look it up once and
    /// memoize. Either way the user→anchor edge is bumped.
    async fn handle_search(
        &self,
        user: &Entity,
        session: &mut UserSession,
        kind: EntityKind,
        text: &str,
        classification: &Classification,
    ) -> EngineResult<TurnOutcome> {
        let key = kind.canonical_key(text);
        if key.is_empty() {
            debug!("[dialogue] Empty {} text, treating as start", kind);
            return Ok(self.handle_start(user, session, classification));
        }

        let (anchor, candidates) = match self.store.find_by_key(kind, &key)? {
            Some(anchor) => {
                debug!("[dialogue] {} '{}' known, using stored results", kind, key);
                let recommended = self.store.find_recommended_for(
                    &key,
                    kind,
                    Some(&user.key),
                    self.max_recipes,
                )?;
                let cached = cached_results(&anchor);
                let candidates = merge_candidates(&recommended, &cached, self.max_recipes);
                (anchor, candidates)
            }
            None => {
                debug!("[dialogue] {} '{}' unknown, querying catalog", kind, key);
                let results = match kind {
                    EntityKind::Cuisine => self.catalog.search_by_cuisine(text).await?,
                    _ => self.catalog.search_by_ingredients(text).await?,
                };
                let detail = serde_json::to_string(&results)?;
                let anchor = self.store.upsert(kind, &key, EntitySeed::detail(detail))?;
                let candidates = catalog_candidates(&results, self.max_recipes);
                (anchor, candidates)
            }
        };

        self.store.record_relation(&user.id, &anchor.id)?;
        session.state.await_selection(Some(anchor), candidates);

        let (action, message) = match kind {
            EntityKind::Cuisine => (
                NotifyAction::Cuisine,
                format!("{} requested recipes for cuisine \"{}\".", user.key, text),
            ),
            _ => (
                NotifyAction::Ingredient,
                format!("{} requested recipes for ingredient \"{}\".", user.key, text),
            ),
        };
        let notification = self.notification(action, message, session, None);
        Ok(TurnOutcome::reply(reply::recipe_list(&session.state.pending)).with(notification))
    }

    async fn handle_selection(
        &self,
        user: &Entity,
        session: &mut UserSession,
        index: i64,
    ) -> EngineResult<TurnOutcome> {
        let in_range = index >= 1
            && index <= self.max_recipes as i64
            && index as usize <= session.state.pending.len();
        if !in_range {
            info!("[dialogue] Invalid selection {} from {}", index, user.key);
            session.state.finish_selection();
            session.context = ConversationContext::empty();
            return Ok(TurnOutcome::reply(reply::INVALID_SELECTION));
        }

        let candidate = session.state.pending[index as usize - 1].clone();
        let key = EntityKind::Recipe.canonical_key(&candidate.id);

        let (recipe, instructions) = match self.store.find_by_key(EntityKind::Recipe, &key)? {
            Some(recipe) => {
                debug!("[dialogue] Recipe {} known, using stored instructions", key);
                let instructions = match recipe.detail.clone() {
                    Some(detail) => detail,
                    None => self.fetch_instructions(&candidate.id).await?.1,
                };
                (recipe, instructions)
            }
            None => {
                debug!("[dialogue] Recipe {} unknown, querying catalog", key);
                let (title, instructions) = self.fetch_instructions(&candidate.id).await?;
                let recipe = self.store.upsert(
                    EntityKind::Recipe,
                    &key,
                    EntitySeed::recipe(title, instructions.clone()),
                )?;
                // A concurrent turn may have stored the recipe first.
                let instructions = recipe.detail.clone().unwrap_or(instructions);
                (recipe, instructions)
            }
        };

        if let Some(anchor) = &session.state.anchor {
            match self.store.find_by_key(anchor.kind, &anchor.key)? {
                Some(current) => {
                    self.store.record_relation(&current.id, &recipe.id)?;
                }
                None => warn!(
                    "[dialogue] {} '{}' was purged, not linking recipe {}",
                    anchor.kind, anchor.key, recipe.key
                ),
            }
        }
        self.store.record_relation(&user.id, &recipe.id)?;

        let title = recipe.title.clone().unwrap_or_else(|| candidate.title.clone());
        let notification = self.notification(
            NotifyAction::Recipe,
            format!("{} selected recipe \"{}\".", user.key, title),
            session,
            Some(recipe.key.clone()),
        );

        session.state.finish_selection();
        session.context = ConversationContext::empty();
        Ok(TurnOutcome::reply(instructions).with(notification))
    }

    async fn fetch_instructions(&self, recipe_id: &str) -> EngineResult<(String, String)> {
        let info = self.catalog.get_recipe_info(recipe_id).await?;
        let steps = self.catalog.get_recipe_steps(recipe_id).await?;
        let text = reply::recipe_instructions(&info, &steps);
        Ok((info.title, text))
    }

    fn notification(
        &self,
        action: NotifyAction,
        message: String,
        session: &UserSession,
        recipe: Option<String>,
    ) -> Notification {
        let user = session
            .state
            .user
            .as_ref()
            .map(|u| u.key.clone())
            .unwrap_or_default();
        Notification {
            action,
            message,
            user,
            ingredient: session.state.anchor_key(EntityKind::Ingredient),
            cuisine: session.state.anchor_key(EntityKind::Cuisine),
            recipe,
        }
    }
}

/// Catalog results memoized on an ingredient/cuisine entity.
fn cached_results(anchor: &Entity) -> Vec<RecipeSummary> {
    let Some(detail) = anchor.detail.as_deref() else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<RecipeSummary>>(detail) {
        Ok(results) => results,
        Err(e) => {
            warn!(
                "[dialogue] Unreadable cached results on {} '{}': {}",
                anchor.kind,
                anchor.key,
                EngineError::from(e)
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::types::{DetectedEntity, IntentFlags, RecipeInfo, RecipeStep};
    use crate::dialogue::sessions::InMemorySessions;
    use crate::dialogue::state::Phase;
    use crate::store::GraphStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // ── Fakes ────────────────────────────────────────────────────────────

    /// Classifies by exact text; anything unscripted is a greeting.
    #[derive(Default)]
    struct ScriptedClassifier {
        scripts: Mutex<HashMap<String, Classification>>,
        seen_contexts: Mutex<Vec<ConversationContext>>,
        fail: AtomicBool,
    }

    impl ScriptedClassifier {
        fn script(&self, text: &str, c: Classification) {
            self.scripts.lock().insert(text.to_string(), c);
        }
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(
            &self,
            _user_id: &str,
            text: &str,
            context: &ConversationContext,
        ) -> EngineResult<Classification> {
            self.seen_contexts.lock().push(context.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(EngineError::upstream("classifier", "unavailable"));
            }
            let mut c = self.scripts.lock().get(text).cloned().unwrap_or_else(|| Classification {
                reply_text: "Hi! Tell me some ingredients or a cuisine.".into(),
                ..Default::default()
            });
            c.context = ConversationContext::from_raw(format!("after:{text}"));
            Ok(c)
        }
    }

    fn ingredients() -> Classification {
        Classification {
            intents: IntentFlags { ingredients: true, ..Default::default() },
            ..Default::default()
        }
    }

    fn cuisine(name: &str) -> Classification {
        Classification {
            entities: vec![DetectedEntity { kind: "cuisine".into(), value: name.into() }],
            ..Default::default()
        }
    }

    fn favorites() -> Classification {
        Classification {
            intents: IntentFlags { favorites: true, ..Default::default() },
            ..Default::default()
        }
    }

    fn selection(n: Option<i64>) -> Classification {
        Classification {
            intents: IntentFlags { selection: true, ..Default::default() },
            selection: n,
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct FakeCatalog {
        results: Mutex<HashMap<String, Vec<RecipeSummary>>>,
        searches: AtomicUsize,
        lookups: AtomicUsize,
        fail: AtomicBool,
    }

    impl FakeCatalog {
        fn with(text: &str, ids: &[&str]) -> Self {
            let catalog = Self::default();
            catalog.add(text, ids);
            catalog
        }

        fn add(&self, text: &str, ids: &[&str]) {
            let list = ids
                .iter()
                .map(|id| RecipeSummary { id: id.to_string(), title: format!("Recipe {id}") })
                .collect();
            self.results.lock().insert(text.to_string(), list);
        }

        fn check(&self) -> EngineResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(EngineError::upstream("catalog", "HTTP 503"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecipeCatalog for FakeCatalog {
        async fn search_by_ingredients(&self, text: &str) -> EngineResult<Vec<RecipeSummary>> {
            self.check()?;
            self.searches.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.lock().get(text).cloned().unwrap_or_default())
        }

        async fn search_by_cuisine(&self, text: &str) -> EngineResult<Vec<RecipeSummary>> {
            self.search_by_ingredients(text).await
        }

        async fn get_recipe_info(&self, id: &str) -> EngineResult<RecipeInfo> {
            self.check()?;
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(RecipeInfo { title: format!("Recipe {id}"), servings: 2, ready_minutes: 30 })
        }

        async fn get_recipe_steps(&self, _id: &str) -> EngineResult<Vec<RecipeStep>> {
            self.check()?;
            Ok(vec![RecipeStep { equipment: vec!["pan".into()], action: "Cook.".into() }])
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&self, notification: Notification) {
            self.events.lock().push(notification);
        }
    }

    /// GraphStore whose relation writes can be switched off.
    struct FlakyStore {
        inner: GraphStore,
        fail_relations: AtomicBool,
    }

    impl EntityStore for FlakyStore {
        fn find_by_key(&self, kind: EntityKind, key: &str) -> EngineResult<Option<Entity>> {
            self.inner.find_by_key(kind, key)
        }
        fn upsert(&self, kind: EntityKind, key: &str, seed: EntitySeed) -> EngineResult<Entity> {
            self.inner.upsert(kind, key, seed)
        }
        fn record_relation(&self, s: &str, t: &str) -> EngineResult<crate::atoms::types::Relation> {
            if self.fail_relations.load(Ordering::SeqCst) {
                return Err(EngineError::StoreUnavailable(rusqlite::Error::InvalidQuery));
            }
            self.inner.record_relation(s, t)
        }
        fn get_relation(&self, s: &str, t: &str) -> EngineResult<Option<crate::atoms::types::Relation>> {
            self.inner.get_relation(s, t)
        }
        fn rank_relations_by_target(
            &self,
            s: &str,
            kind: EntityKind,
            limit: usize,
        ) -> EngineResult<Vec<crate::atoms::types::RankedEntity>> {
            self.inner.rank_relations_by_target(s, kind, limit)
        }
        fn find_recommended_for(
            &self,
            key: &str,
            kind: EntityKind,
            user: Option<&str>,
            limit: usize,
        ) -> EngineResult<Vec<crate::atoms::types::RankedEntity>> {
            self.inner.find_recommended_for(key, kind, user, limit)
        }
        fn delete_by_keys(&self, kind: EntityKind, keys: &[String]) -> EngineResult<usize> {
            self.inner.delete_by_keys(kind, keys)
        }
    }

    struct Harness {
        controller: DialogueController,
        store: Arc<FlakyStore>,
        catalog: Arc<FakeCatalog>,
        classifier: Arc<ScriptedClassifier>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn new(catalog: FakeCatalog) -> Self {
            let store = Arc::new(FlakyStore {
                inner: GraphStore::open_in_memory().unwrap(),
                fail_relations: AtomicBool::new(false),
            });
            let catalog = Arc::new(catalog);
            let classifier = Arc::new(ScriptedClassifier::default());
            classifier.script("chicken, rice", ingredients());
            classifier.script("Rice,Chicken", ingredients());
            classifier.script("thai please", cuisine("Thai"));
            classifier.script("my favorites", favorites());
            let sink = Arc::new(RecordingSink::default());
            let controller = DialogueController::new(
                store.clone(),
                catalog.clone(),
                classifier.clone(),
                sink.clone(),
                Arc::new(InMemorySessions::new()),
            );
            Self { controller, store, catalog, classifier, sink }
        }

        async fn say(&self, text: &str) -> String {
            self.controller.handle_turn("U1", text).await.unwrap()
        }

        async fn session(&self) -> UserSession {
            self.controller.sessions().get("U1").await
        }

        fn entity(&self, kind: EntityKind, key: &str) -> Option<Entity> {
            self.store.find_by_key(kind, key).unwrap()
        }

        fn actions(&self) -> Vec<NotifyAction> {
            self.sink.events.lock().iter().map(|n| n.action).collect()
        }
    }

    fn chicken_catalog() -> FakeCatalog {
        FakeCatalog::with("chicken, rice", &["101", "102", "103", "104", "105", "106"])
    }

    // ── Start ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn start_creates_user_and_notifies_once() {
        let h = Harness::new(FakeCatalog::default());
        let reply = h.say("hello").await;
        assert_eq!(reply, "Hi! Tell me some ingredients or a cuisine.");
        h.say("hello again").await;

        assert!(h.entity(EntityKind::User, "U1").is_some());
        let session = h.session().await;
        assert!(session.state.conversation_started);
        assert_eq!(session.state.phase(), Phase::Idle);
        assert_eq!(h.actions(), vec![NotifyAction::Start]);
    }

    #[tokio::test]
    async fn context_is_passed_back_on_next_turn() {
        let h = Harness::new(FakeCatalog::default());
        h.say("hello").await;
        h.say("again").await;
        let seen = h.classifier.seen_contexts.lock().clone();
        assert_eq!(seen[0], ConversationContext::empty());
        assert_eq!(seen[1], ConversationContext::from_raw("after:hello"));
    }

    // ── Search ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn new_ingredient_queries_catalog_and_memoizes() {
        let h = Harness::new(chicken_catalog());
        let reply = h.say("chicken, rice").await;
        assert!(reply.starts_with("Let's see here..."));
        assert!(reply.contains("5. Recipe 105"));
        assert!(!reply.contains("Recipe 106"));

        let ingredient = h.entity(EntityKind::Ingredient, "chicken,rice").unwrap();
        assert!(ingredient.detail.unwrap().contains("106"));

        let session = h.session().await;
        assert_eq!(session.state.phase(), Phase::AwaitingSelection);
        assert_eq!(session.state.pending.len(), 5);
        assert_eq!(session.state.anchor.as_ref().unwrap().key, "chicken,rice");

        // Same ingredients, different spelling: no second catalog call.
        h.say("Rice,Chicken").await;
        assert_eq!(h.catalog.searches.load(Ordering::SeqCst), 1);
        let user = h.entity(EntityKind::User, "U1").unwrap();
        let ingredient = h.entity(EntityKind::Ingredient, "chicken,rice").unwrap();
        assert_eq!(h.store.get_relation(&user.id, &ingredient.id).unwrap().unwrap().count, 2);
    }

    #[tokio::test]
    async fn cuisine_entity_anchors_on_cuisine() {
        let h = Harness::new(FakeCatalog::with("Thai", &["7", "8"]));
        let reply = h.say("thai please").await;
        assert!(reply.contains("1. Recipe 7\n2. Recipe 8\n"));

        let session = h.session().await;
        assert_eq!(session.state.anchor.as_ref().unwrap().kind, EntityKind::Cuisine);
        let events = h.sink.events.lock().clone();
        let last = events.last().unwrap();
        assert_eq!(last.action, NotifyAction::Cuisine);
        assert_eq!(last.cuisine, "thai");
        assert_eq!(last.ingredient, "");
    }

    #[tokio::test]
    async fn favorites_outrank_other_intents() {
        let h = Harness::new(FakeCatalog::default());
        let mut both = favorites();
        both.intents.ingredients = true;
        both.entities = cuisine("Thai").entities;
        h.classifier.script("everything", both);

        let reply = h.say("everything").await;
        assert_eq!(reply, reply::NO_FAVORITES);
        assert_eq!(h.catalog.searches.load(Ordering::SeqCst), 0);
        assert_eq!(h.session().await.state.phase(), Phase::Idle);
    }

    // ── Selection ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn selection_stores_recipe_and_relations_then_resets() {
        let h = Harness::new(chicken_catalog());
        h.classifier.script("2", selection(Some(2)));
        h.say("hello").await;
        h.say("chicken, rice").await;

        let reply = h.say("2").await;
        assert!(reply.starts_with("Ok, it takes *30* minutes to make *2* servings of *Recipe 102*."));

        let recipe = h.entity(EntityKind::Recipe, "102").unwrap();
        assert_eq!(recipe.title.as_deref(), Some("Recipe 102"));
        let user = h.entity(EntityKind::User, "U1").unwrap();
        let ingredient = h.entity(EntityKind::Ingredient, "chicken,rice").unwrap();
        assert_eq!(h.store.get_relation(&user.id, &recipe.id).unwrap().unwrap().count, 1);
        assert_eq!(h.store.get_relation(&ingredient.id, &recipe.id).unwrap().unwrap().count, 1);

        let session = h.session().await;
        assert_eq!(session.state.phase(), Phase::Idle);
        assert!(session.state.anchor.is_none());
        assert!(!session.state.conversation_started);
        assert!(session.context.is_empty());

        let events = h.sink.events.lock().clone();
        let last = events.last().unwrap();
        assert_eq!(last.action, NotifyAction::Recipe);
        assert_eq!(last.recipe.as_deref(), Some("102"));
        assert_eq!(last.ingredient, "chicken,rice");
    }

    #[tokio::test]
    async fn second_selection_reuses_stored_recipe_and_recommends_it() {
        let h = Harness::new(chicken_catalog());
        h.classifier.script("3", selection(None));
        h.say("chicken, rice").await;
        let first = h.say("3").await;
        h.say("chicken, rice").await;

        // The chosen recipe is now recommended and listed first.
        let session = h.session().await;
        assert_eq!(session.state.pending[0].id, "103");
        assert!(session.state.pending[0].recommended);
        assert_eq!(session.state.pending.len(), 5);

        h.classifier.script("1", selection(None));
        let second = h.say("1").await;
        assert_eq!(first, second);
        assert_eq!(h.catalog.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn out_of_range_selections_are_invalid() {
        for (text, index) in [("zero", Some(0)), ("six", Some(6)), ("junk", None)] {
            let h = Harness::new(chicken_catalog());
            h.classifier.script(text, selection(index));
            h.say("hello").await;
            h.say("chicken, rice").await;

            assert_eq!(h.say(text).await, reply::INVALID_SELECTION);
            let session = h.session().await;
            assert_eq!(session.state.phase(), Phase::Idle);
            assert!(session.state.anchor.is_none());
            assert!(!session.state.conversation_started);
            assert!(session.context.is_empty());
            assert_eq!(h.store.inner.stats().unwrap().recipes, 0);
        }
    }

    #[tokio::test]
    async fn selection_beyond_pending_is_invalid() {
        let h = Harness::new(FakeCatalog::with("chicken, rice", &["1", "2"]));
        h.classifier.script("3", selection(Some(3)));
        h.say("chicken, rice").await;
        assert_eq!(h.say("3").await, reply::INVALID_SELECTION);
        assert_eq!(h.store.inner.stats().unwrap().recipes, 0);
    }

    #[tokio::test]
    async fn selection_while_idle_is_invalid() {
        let h = Harness::new(FakeCatalog::default());
        h.classifier.script("1", selection(Some(1)));
        assert_eq!(h.say("1").await, reply::INVALID_SELECTION);
        let stats = h.store.inner.stats().unwrap();
        assert_eq!(stats.recipes, 0);
        assert_eq!(stats.relations, 0);
    }

    #[tokio::test]
    async fn favorites_list_users_recipes_and_clear_anchor() {
        let h = Harness::new(chicken_catalog());
        h.classifier.script("4", selection(Some(4)));
        h.say("chicken, rice").await;
        h.say("4").await;

        let reply = h.say("my favorites").await;
        assert!(reply.contains("1. Recipe 104\n"));
        assert!(!reply.contains("other user"));
        let session = h.session().await;
        assert!(session.state.anchor.is_none());
        assert_eq!(session.state.phase(), Phase::AwaitingSelection);
    }

    // ── Failures ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn upstream_failure_leaves_session_untouched() {
        let h = Harness::new(chicken_catalog());
        h.say("hello").await;
        let before = h.session().await;

        h.catalog.fail.store(true, Ordering::SeqCst);
        let err = h.controller.handle_turn("U1", "chicken, rice").await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(h.session().await, before);

        h.classifier.fail.store(true, Ordering::SeqCst);
        assert!(h.controller.handle_turn("U1", "hello").await.is_err());
        assert_eq!(h.session().await, before);
    }

    #[tokio::test]
    async fn store_failure_leaves_session_untouched() {
        let h = Harness::new(chicken_catalog());
        h.classifier.script("1", selection(Some(1)));
        h.say("chicken, rice").await;
        let before = h.session().await;
        let events_before = h.sink.events.lock().len();

        h.store.fail_relations.store(true, Ordering::SeqCst);
        let err = h.controller.handle_turn("U1", "1").await.unwrap_err();
        assert!(err.is_store());
        assert_eq!(h.session().await, before);
        assert_eq!(h.sink.events.lock().len(), events_before);

        // Once the store recovers the same selection goes through.
        h.store.fail_relations.store(false, Ordering::SeqCst);
        assert!(h.say("1").await.starts_with("Ok, it takes"));
    }

    #[tokio::test]
    async fn purged_user_is_recreated_on_next_turn() {
        let h = Harness::new(chicken_catalog());
        h.say("hello").await;
        let first = h.entity(EntityKind::User, "U1").unwrap();
        assert_eq!(h.store.delete_by_keys(EntityKind::User, &["U1".to_string()]).unwrap(), 1);

        h.say("chicken, rice").await;
        let user = h.entity(EntityKind::User, "U1").expect("user recreated");
        assert_ne!(user.id, first.id);
        let ingredient = h.entity(EntityKind::Ingredient, "chicken,rice").unwrap();
        assert_eq!(h.store.get_relation(&user.id, &ingredient.id).unwrap().unwrap().count, 1);

        // Every edge hangs off a live user, so a second purge clears them.
        assert_eq!(h.store.delete_by_keys(EntityKind::User, &["U1".to_string()]).unwrap(), 1);
        assert_eq!(h.store.inner.stats().unwrap().relations, 0);
    }

    #[tokio::test]
    async fn purged_anchor_gets_no_recipe_edge() {
        let h = Harness::new(chicken_catalog());
        h.classifier.script("2", selection(Some(2)));
        h.say("chicken, rice").await;
        h.store
            .delete_by_keys(EntityKind::Ingredient, &["chicken,rice".to_string()])
            .unwrap();

        assert!(h.say("2").await.starts_with("Ok, it takes"));
        let user = h.entity(EntityKind::User, "U1").unwrap();
        let recipe = h.entity(EntityKind::Recipe, "102").unwrap();
        assert_eq!(h.store.get_relation(&user.id, &recipe.id).unwrap().unwrap().count, 1);
        assert!(h.entity(EntityKind::Ingredient, "chicken,rice").is_none());
        assert_eq!(h.store.inner.stats().unwrap().relations, 1);
    }

    #[test]
    fn unreadable_cache_yields_no_results() {
        let anchor = Entity {
            id: "x".into(),
            kind: EntityKind::Ingredient,
            key: "beef".into(),
            title: None,
            detail: Some("not json".into()),
            created_at: String::new(),
        };
        assert!(cached_results(&anchor).is_empty());
    }
}
