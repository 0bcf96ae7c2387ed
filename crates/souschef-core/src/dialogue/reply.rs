// ── Dialogue: Reply Text ─────────────────────────────────────────────────────
// Markdown-flavoured text for chat transports (Telegram renders *bold* and
// _italic_).

use super::state::RecipeCandidate;
use crate::atoms::types::{RecipeInfo, RecipeStep};
use std::fmt::Write;

pub const INVALID_SELECTION: &str = "Invalid selection! Say anything to start over...";

pub const NO_FAVORITES: &str =
    "You haven't selected any recipes yet. Tell me some ingredients or a cuisine to get started!";

/// Sent by transports when a turn fails; the user's state is unchanged.
pub const FALLBACK: &str = "Sorry, something went wrong... Please try that again.";

pub fn recipe_list(candidates: &[RecipeCandidate]) -> String {
    let mut out = String::from("Let's see here...\nI've found these recipes: \n");
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = write!(out, "{}. {}", i + 1, candidate.title);
        if candidate.recommended {
            let n = candidate.observed_count;
            let (users, likes) = if n == 1 { ("user", "likes") } else { ("users", "like") };
            let _ = write!(out, " *({} other {} {} this)", n, users, likes);
        }
        out.push('\n');
    }
    out.push_str("\nPlease enter the corresponding number of your choice.");
    out
}

/// Instructions text cached as recipe detail and sent on selection.
pub fn recipe_instructions(info: &RecipeInfo, steps: &[RecipeStep]) -> String {
    let mut out = format!(
        "Ok, it takes *{}* minutes to make *{}* servings of *{}*. Here are the steps:\n\n",
        info.ready_minutes, info.servings, info.title
    );

    if steps.is_empty() {
        out.push_str("_No instructions available for this recipe._\n\n");
    }
    for (i, step) in steps.iter().enumerate() {
        let equipment = if step.equipment.is_empty() {
            "None".to_string()
        } else {
            step.equipment.join(",")
        };
        let _ = write!(
            out,
            "*Step {}*:\n_Equipment_: {}\n_Action_: {}\n\n",
            i + 1,
            equipment,
            step.action
        );
    }

    out.push_str("*Say anything to me to start over...*");
    out
}
