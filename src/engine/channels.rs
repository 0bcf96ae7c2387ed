// SousChef: Channel glue shared by transports.

use log::{debug, error};
use souschef_core::dialogue::reply::FALLBACK;
use souschef_core::DialogueController;

/// Run one inbound message through the dialogue and return the text to send
/// back. A failed turn leaves the user's state untouched and yields the
/// generic fallback reply.
pub async fn route_message(
    controller: &DialogueController,
    channel: &str,
    user_id: &str,
    text: &str,
) -> String {
    debug!("[{}] Turn from {}: {}", channel, user_id, preview(text, 50));
    match controller.handle_turn(user_id, text).await {
        Ok(reply) => reply,
        Err(e) => {
            error!("[{}] Turn failed for {}: {}", channel, user_id, e);
            FALLBACK.to_string()
        }
    }
}

/// Split a long message into chunks of at most `max_len` bytes, preferring
/// newline then space breaks. Never splits inside a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }
        let mut limit = max_len.max(1);
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        if limit == 0 {
            limit = remaining.chars().next().map(char::len_utf8).unwrap_or(1);
        }
        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }
    chunks
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
