// ── SousChef Atoms Layer ───────────────────────────────────────────────────
// Pure constants, value types, collaborator traits and the error enum.
// Dependency rule: atoms may only depend on std and external pure crates.
// Nothing here may import from store/, dialogue/ or clients/.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
