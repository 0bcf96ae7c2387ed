// ── Dialogue: Per-User State ─────────────────────────────────────────────────

use crate::atoms::types::{ConversationContext, Entity, EntityKind};
use serde::Serialize;

/// Where a user is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No candidates on offer.
    Idle,
    /// A numbered recipe list was sent; the next numeric turn picks one.
    AwaitingSelection,
}

/// One numbered entry of the list offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeCandidate {
    /// Canonical recipe key (the catalog id).
    pub id: String,
    pub title: String,
    /// Surfaced by relation ranking rather than a catalog lookup.
    pub recommended: bool,
    /// Aggregate count of the edge that ranked it; 0 for catalog results.
    pub observed_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialogueState {
    pub user: Option<Entity>,
    /// Ingredient or cuisine most recently searched.
    pub anchor: Option<Entity>,
    pub conversation_started: bool,
    pub pending: Vec<RecipeCandidate>,
}

impl DialogueState {
    pub fn phase(&self) -> Phase {
        if self.pending.is_empty() {
            Phase::Idle
        } else {
            Phase::AwaitingSelection
        }
    }

    /// Offer `candidates` for selection, attributed to `anchor`.
    pub fn await_selection(&mut self, anchor: Option<Entity>, candidates: Vec<RecipeCandidate>) {
        self.anchor = anchor;
        self.pending = candidates;
    }

    /// Back to `Idle` after a selection (valid or not).
    pub fn finish_selection(&mut self) {
        self.anchor = None;
        self.pending.clear();
        self.conversation_started = false;
    }

    /// Anchor key when the anchor is of `kind`, otherwise empty.
    pub fn anchor_key(&self, kind: EntityKind) -> String {
        match &self.anchor {
            Some(anchor) if anchor.kind == kind => anchor.key.clone(),
            _ => String::new(),
        }
    }
}

/// Everything kept for one user between turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserSession {
    pub state: DialogueState,
    /// Classifier context from the previous turn, passed back untouched.
    pub context: ConversationContext,
}
