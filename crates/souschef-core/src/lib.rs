// SousChef Core: conversational recipe recommendations.
//
// Layers:
//   atoms     - errors, value types, collaborator traits, constants
//   store     - SQLite-backed entity/relation graph (GraphStore)
//   dialogue  - per-user state machine and DialogueController
//   clients   - HTTP catalog, classifier and notification implementations
//   config    - TOML + environment configuration
//   paths     - default on-disk locations

pub mod atoms;
pub mod clients;
pub mod config;
pub mod dialogue;
pub mod paths;
pub mod store;

pub use atoms::error::{EngineError, EngineResult};
pub use atoms::traits::{Classifier, EntityStore, NotificationSink, RecipeCatalog};
pub use config::SousChefConfig;
pub use dialogue::{DialogueController, InMemorySessions, SessionStore};
pub use store::GraphStore;

use std::sync::Arc;

/// Wire the production collaborators from `config` around `store`.
pub fn build_controller(
    config: &SousChefConfig,
    store: Arc<dyn EntityStore>,
) -> EngineResult<DialogueController> {
    let catalog = Arc::new(clients::SpoonacularCatalog::new(&config.catalog)?);
    let classifier = Arc::new(clients::AssistantClassifier::new(&config.classifier)?);
    let notifier = clients::notification_sink(&config.notify)?;

    Ok(DialogueController::new(
        store,
        catalog,
        classifier,
        notifier,
        Arc::new(InMemorySessions::new()),
    )
    .with_max_recipes(config.dialogue.max_recipes))
}
