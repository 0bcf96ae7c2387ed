// ── SousChef Clients: Classifier ────────────────────────────────────────────
//
// Assistant-style message API (Watson Conversation v1 wire format).
// The dialogue flags live in the returned context; the whole context is kept
// as an opaque JSON string and sent back on the user's next turn.

use super::http::{send_with_retry, CircuitBreaker};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::Classifier;
use crate::atoms::types::{Classification, ConversationContext, DetectedEntity, IntentFlags};
use crate::config::ClassifierConfig;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SERVICE: &str = "classifier";
const API_VERSION: &str = "2016-07-11";

pub struct AssistantClassifier {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
    breaker: CircuitBreaker,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    output: Output,
    #[serde(default)]
    context: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawEntity {
    entity: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct Output {
    #[serde(default)]
    text: Vec<String>,
}

impl AssistantClassifier {
    pub fn new(config: &ClassifierConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        let endpoint = format!(
            "{}/v1/workspaces/{}/message?version={}",
            config.url.trim_end_matches('/'),
            urlencoding::encode(&config.workspace_id),
            API_VERSION
        );
        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            breaker: CircuitBreaker::default(),
        })
    }
}

#[async_trait]
impl Classifier for AssistantClassifier {
    async fn classify(
        &self,
        user_id: &str,
        text: &str,
        context: &ConversationContext,
    ) -> EngineResult<Classification> {
        let body = request_body(text, context)?;
        debug!("[classifier] Classifying turn for {}", user_id);

        let response = send_with_retry(SERVICE, &self.breaker, || {
            self.client
                .post(&self.endpoint)
                .basic_auth(&self.username, Some(&self.password))
                .json(&body)
        })
        .await?;

        let text = response.text().await?;
        let classification = into_classification(parse_response(&text)?)?;
        debug!(
            "[classifier] {} → {:?}, {} entit(ies)",
            user_id,
            classification.intents,
            classification.entities.len()
        );
        Ok(classification)
    }
}

fn parse_response(body: &str) -> EngineResult<MessageResponse> {
    serde_json::from_str(body)
        .map_err(|e| EngineError::upstream(SERVICE, format!("malformed payload: {e}")))
}

fn request_body(text: &str, context: &ConversationContext) -> EngineResult<Value> {
    let mut body = json!({ "input": { "text": text } });
    if let Some(raw) = context.as_raw() {
        body["context"] = serde_json::from_str(raw)?;
    }
    Ok(body)
}

fn into_classification(raw: MessageResponse) -> EngineResult<Classification> {
    let ctx = raw.context.unwrap_or(Value::Null);
    let flag = |name: &str| ctx.get(name).and_then(Value::as_bool).unwrap_or(false);

    let intents = IntentFlags {
        favorites: flag("is_favorites"),
        ingredients: flag("is_ingredients"),
        selection: flag("is_selection"),
    };
    let selection = ctx.get("selection").and_then(selection_number);
    let context = if ctx.is_null() {
        ConversationContext::empty()
    } else {
        ConversationContext::from_raw(serde_json::to_string(&ctx)?)
    };

    Ok(Classification {
        intents,
        entities: raw
            .entities
            .into_iter()
            .map(|e| DetectedEntity { kind: e.entity, value: e.value })
            .collect(),
        reply_text: raw.output.text.join("\n"),
        context,
        selection,
    })
}

/// The assistant reports the chosen number as a JSON number or a string.
/// A fractional number is an invalid choice (-1); a non-number is absent.
fn selection_number(value: &Value) -> Option<i64> {
    let number = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            n.as_f64()?
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(i);
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if number.fract() == 0.0 && number.is_finite() {
        Some(number as i64)
    } else {
        Some(-1)
    }
}
