// SousChef: Telegram Bot Bridge
//
// Long-polls getUpdates and feeds each text message from a human sender into
// the dialogue. Every message is handled on its own task so users never wait
// on each other; one user's turns queue on that user's session lock.
//
// Setup: message @BotFather → get a bot token → set TELEGRAM_BOT_TOKEN.

use crate::engine::channels;
use log::{debug, error, info, warn};
use serde::Deserialize;
use souschef_core::clients::http::reconnect_delay;
use souschef_core::config::TelegramConfig;
use souschef_core::{DialogueController, EngineError, EngineResult};
use std::sync::Arc;
use std::time::Duration;

const TG_API: &str = "https://api.telegram.org/bot";

/// Telegram rejects messages above 4096 chars; leave headroom.
const MAX_MESSAGE_LEN: usize = 4000;

/// Consecutive getUpdates failures before the bridge reconnects.
const MAX_POLL_FAILURES: u32 = 5;

// ── Telegram API Types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUpdate {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    message_id: i64,
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgBot {
    username: Option<String>,
    first_name: String,
}

/// A text message worth answering.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Inbound {
    user_id: String,
    chat_id: i64,
    message_id: i64,
    text: String,
}

/// Drops bot senders, anonymous senders and non-text messages.
fn inbound(update: TgUpdate) -> Option<Inbound> {
    let msg = update.message?;
    let from = msg.from.filter(|u| !u.is_bot)?;
    let text = msg.text.filter(|t| !t.trim().is_empty())?;
    Some(Inbound {
        user_id: from.id.to_string(),
        chat_id: msg.chat.id,
        message_id: msg.message_id,
        text,
    })
}

// ── API Helpers ────────────────────────────────────────────────────────

fn unwrap_response<T>(method: &str, resp: TgResponse<T>) -> EngineResult<T> {
    if !resp.ok {
        return Err(EngineError::channel(
            "telegram",
            format!("{} failed: {}", method, resp.description.unwrap_or_default()),
        ));
    }
    resp.result
        .ok_or_else(|| EngineError::channel("telegram", format!("{}: no result", method)))
}

async fn tg_get_me(client: &reqwest::Client, token: &str) -> EngineResult<TgBot> {
    let url = format!("{}{}/getMe", TG_API, token);
    let resp: TgResponse<TgBot> = client.get(&url).send().await?.json().await?;
    unwrap_response("getMe", resp)
}

async fn tg_get_updates(
    client: &reqwest::Client,
    token: &str,
    offset: i64,
    timeout: u64,
) -> EngineResult<Vec<TgUpdate>> {
    let url = format!(
        "{}{}/getUpdates?offset={}&timeout={}&allowed_updates=[\"message\"]",
        TG_API, token, offset, timeout
    );
    let resp: TgResponse<Vec<TgUpdate>> = client
        .get(&url)
        .timeout(Duration::from_secs(timeout + 10))
        .send()
        .await?
        .json()
        .await?;
    unwrap_response("getUpdates", resp)
}

async fn tg_send_message(
    client: &reqwest::Client,
    token: &str,
    chat_id: i64,
    text: &str,
    reply_to: Option<i64>,
) {
    let url = format!("{}{}/sendMessage", TG_API, token);
    for (i, chunk) in channels::split_message(text, MAX_MESSAGE_LEN).iter().enumerate() {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": chunk,
            "parse_mode": "Markdown",
        });
        if let (0, Some(msg_id)) = (i, reply_to) {
            body["reply_to_message_id"] = serde_json::json!(msg_id);
        }

        match client.post(&url).json(&body).send().await {
            Ok(r) if r.status().is_success() => {}
            Ok(r) => {
                // Recipe titles can break Markdown parsing; resend as plain text.
                debug!("[telegram] Markdown send rejected ({}), retrying plain", r.status());
                if let Some(obj) = body.as_object_mut() {
                    obj.remove("parse_mode");
                }
                if let Err(e) = client.post(&url).json(&body).send().await {
                    warn!("[telegram] sendMessage failed: {}", e);
                }
            }
            Err(e) => warn!("[telegram] sendMessage failed: {}", e),
        }
    }
}

async fn tg_send_chat_action(client: &reqwest::Client, token: &str, chat_id: i64) {
    let url = format!("{}{}/sendChatAction", TG_API, token);
    let body = serde_json::json!({ "chat_id": chat_id, "action": "typing" });
    let _ = client.post(&url).json(&body).send().await;
}

// ── Bridge Core ────────────────────────────────────────────────────────

/// Serve the dialogue over Telegram until Ctrl-C. Connection failures are
/// retried with escalating backoff.
pub async fn run_bridge(
    controller: Arc<DialogueController>,
    config: TelegramConfig,
) -> EngineResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()?;

    let bridge = async {
        let mut reconnect_attempt: u32 = 0;
        loop {
            if let Err(e) =
                run_polling_loop(&client, &controller, &config, &mut reconnect_attempt).await
            {
                error!("[telegram] Bridge error: {}, reconnecting", e);
                let delay = reconnect_delay(reconnect_attempt).await;
                warn!(
                    "[telegram] Reconnected after {}ms (attempt {})",
                    delay.as_millis(),
                    reconnect_attempt + 1
                );
                reconnect_attempt += 1;
            }
        }
    };

    tokio::select! {
        _ = bridge => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("[telegram] Ctrl-C received, bridge stopped");
        }
    }
    Ok(())
}

/// Returns only on error; the caller reconnects.
async fn run_polling_loop(
    client: &reqwest::Client,
    controller: &Arc<DialogueController>,
    config: &TelegramConfig,
    reconnect_attempt: &mut u32,
) -> EngineResult<()> {
    let token = config.bot_token.as_str();
    let me = tg_get_me(client, token).await?;
    info!(
        "[telegram] Connected as @{} ({})",
        me.username.as_deref().unwrap_or("unknown"),
        me.first_name
    );
    *reconnect_attempt = 0;

    let mut offset: i64 = 0;
    let mut failures: u32 = 0;
    loop {
        let updates = match tg_get_updates(client, token, offset, config.poll_timeout_secs).await {
            Ok(updates) => {
                failures = 0;
                updates
            }
            Err(e) => {
                failures += 1;
                if failures >= MAX_POLL_FAILURES {
                    return Err(e);
                }
                warn!("[telegram] Poll error: {}, retrying in 5s", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(msg) = inbound(update) else { continue };

            let client = client.clone();
            let token = token.to_string();
            let controller = Arc::clone(controller);
            tokio::spawn(async move {
                tg_send_chat_action(&client, &token, msg.chat_id).await;
                let reply =
                    channels::route_message(&controller, "telegram", &msg.user_id, &msg.text).await;
                if !reply.is_empty() {
                    tg_send_message(&client, &token, msg.chat_id, &reply, Some(msg.message_id))
                        .await;
                }
            });
        }
    }
}
