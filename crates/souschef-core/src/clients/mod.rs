// SousChef: Collaborator clients
// HTTP implementations of the catalog, classifier and notification traits.

pub mod catalog;
pub mod classifier;
pub mod http;
pub mod notify;

use crate::atoms::error::EngineResult;
use crate::atoms::traits::{NoopSink, NotificationSink};
use crate::config::NotifyConfig;
use std::sync::Arc;

pub use catalog::SpoonacularCatalog;
pub use classifier::AssistantClassifier;
pub use notify::HttpNotifier;

/// The configured notification sink, or a no-op when no URL is set.
pub fn notification_sink(config: &NotifyConfig) -> EngineResult<Arc<dyn NotificationSink>> {
    if config.enabled() {
        Ok(Arc::new(HttpNotifier::new(config)?))
    } else {
        log::info!("[notify] No notification URL configured, events are dropped");
        Ok(Arc::new(NoopSink))
    }
}
