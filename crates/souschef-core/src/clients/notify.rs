// ── SousChef Clients: Notification Sink ─────────────────────────────────────
//
// Fire-and-forget JSON POST to `<url>/<api key>/notification`. Delivery runs
// on a spawned task; failures are logged and dropped.

use crate::atoms::error::EngineResult;
use crate::atoms::traits::NotificationSink;
use crate::atoms::types::Notification;
use crate::config::NotifyConfig;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub struct HttpNotifier {
    client: Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(config: &NotifyConfig) -> EngineResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}/notification",
                config.url.trim_end_matches('/'),
                urlencoding::encode(&config.api_key)
            ),
        })
    }
}

impl NotificationSink for HttpNotifier {
    fn notify(&self, notification: Notification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("[notify] No async runtime, dropping {:?} event", notification.action);
            return;
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = payload(&notification);

        runtime.spawn(async move {
            match client.post(&endpoint).json(&body).send().await {
                Ok(r) if r.status().is_success() => {
                    debug!("[notify] Delivered {:?}", notification.action);
                }
                Ok(r) => warn!("[notify] {:?} rejected: HTTP {}", notification.action, r.status()),
                Err(e) => warn!("[notify] {:?} failed: {}", notification.action, e),
            }
        });
    }
}

fn payload(n: &Notification) -> Value {
    json!({
        "userQuery": { "type": "action" },
        "notification": {
            "action": n.action,
            "message": n.message,
            "state": {
                "user": n.user,
                "ingredient": n.ingredient,
                "cuisine": n.cuisine,
                "recipe": n.recipe,
            }
        }
    })
}
