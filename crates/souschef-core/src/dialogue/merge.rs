// ── Dialogue: Candidate Merge ────────────────────────────────────────────────

use super::state::RecipeCandidate;
use crate::atoms::types::{EntityKind, RankedEntity, RecipeSummary};
use std::collections::HashSet;

/// Recommended recipes first (in ranking order, tagged with their count),
/// then catalog results whose id is not already listed (in provider order),
/// stopping at `limit` entries. Ids are compared in canonical form.
pub fn merge_candidates(
    recommended: &[RankedEntity],
    catalog: &[RecipeSummary],
    limit: usize,
) -> Vec<RecipeCandidate> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(limit);

    let from_ranking = recommended.iter().map(|r| RecipeCandidate {
        id: r.entity.key.clone(),
        title: r.entity.title.clone().unwrap_or_else(|| r.entity.key.clone()),
        recommended: true,
        observed_count: r.count,
    });
    let from_catalog = catalog.iter().map(|s| RecipeCandidate {
        id: EntityKind::Recipe.canonical_key(&s.id),
        title: s.title.clone(),
        recommended: false,
        observed_count: 0,
    });

    for candidate in from_ranking.chain(from_catalog) {
        if merged.len() >= limit {
            break;
        }
        if seen.insert(candidate.id.clone()) {
            merged.push(candidate);
        }
    }

    merged
}

/// Catalog results as candidates, in provider order.
pub fn catalog_candidates(catalog: &[RecipeSummary], limit: usize) -> Vec<RecipeCandidate> {
    merge_candidates(&[], catalog, limit)
}
