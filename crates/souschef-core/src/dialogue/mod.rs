// SousChef: Dialogue
// Per-user conversation state and the controller that drives it.
//
// Module layout:
//   state      - DialogueState, RecipeCandidate, UserSession
//   sessions   - SessionStore trait + in-process implementation
//   merge      - recommended-first candidate merge
//   reply      - user-facing text assembly
//   controller - DialogueController::handle_turn

pub mod controller;
pub mod merge;
pub mod reply;
pub mod sessions;
pub mod state;

pub use controller::DialogueController;
pub use sessions::{InMemorySessions, SessionStore};
pub use state::{DialogueState, Phase, RecipeCandidate, UserSession};
