// ── SousChef Clients: Recipe Catalog ────────────────────────────────────────
//
// Spoonacular-compatible REST catalog. The key travels in `X-Mashape-Key`.
//
//   GET /recipes/findByIngredients   ingredient search (bare array)
//   GET /recipes/search              cuisine search ({"results": [...]})
//   GET /recipes/{id}/information    title, servings, readyInMinutes
//   GET /recipes/{id}/analyzedInstructions   instruction blocks → steps

use super::http::{send_with_retry, CircuitBreaker};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::traits::RecipeCatalog;
use crate::atoms::types::{RecipeInfo, RecipeStep, RecipeSummary};
use crate::config::CatalogConfig;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "catalog";

pub struct SpoonacularCatalog {
    client: Client,
    base_url: String,
    api_key: String,
    results: usize,
    breaker: CircuitBreaker,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<RecipeSummary>,
}

#[derive(Debug, Deserialize)]
struct InstructionBlock {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    step: String,
    #[serde(default)]
    equipment: Vec<RawEquipment>,
}

#[derive(Debug, Deserialize)]
struct RawEquipment {
    name: String,
}

impl SpoonacularCatalog {
    pub fn new(config: &CatalogConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            results: config.results.max(1),
            breaker: CircuitBreaker::default(),
        })
    }

    async fn get(&self, path_and_query: &str) -> EngineResult<String> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("[catalog] GET {}", url);
        let response = send_with_retry(SERVICE, &self.breaker, || {
            self.client
                .get(&url)
                .header("X-Mashape-Key", &self.api_key)
                .header("Accept", "application/json")
        })
        .await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RecipeCatalog for SpoonacularCatalog {
    async fn search_by_ingredients(&self, text: &str) -> EngineResult<Vec<RecipeSummary>> {
        let body = self
            .get(&format!(
                "/recipes/findByIngredients?fillIngredients=false&ingredients={}&limitLicense=false&number={}&ranking=1",
                urlencoding::encode(text),
                self.results
            ))
            .await?;
        let found = parse_ingredient_search(&body)?;
        info!("[catalog] {} recipe(s) for ingredients '{}'", found.len(), text);
        Ok(found)
    }

    async fn search_by_cuisine(&self, text: &str) -> EngineResult<Vec<RecipeSummary>> {
        let body = self
            .get(&format!(
                "/recipes/search?number={}&query=%20&cuisine={}",
                self.results,
                urlencoding::encode(text)
            ))
            .await?;
        let found = parse_cuisine_search(&body)?;
        info!("[catalog] {} recipe(s) for cuisine '{}'", found.len(), text);
        Ok(found)
    }

    async fn get_recipe_info(&self, id: &str) -> EngineResult<RecipeInfo> {
        let body = self
            .get(&format!(
                "/recipes/{}/information?includeNutrition=false",
                urlencoding::encode(id)
            ))
            .await?;
        decode(&body)
    }

    async fn get_recipe_steps(&self, id: &str) -> EngineResult<Vec<RecipeStep>> {
        let body = self
            .get(&format!(
                "/recipes/{}/analyzedInstructions?stepBreakdown=true",
                urlencoding::encode(id)
            ))
            .await?;
        parse_steps(&body)
    }
}

/// A body that does not match the expected shape is the catalog's fault.
fn decode<T: DeserializeOwned>(body: &str) -> EngineResult<T> {
    serde_json::from_str(body)
        .map_err(|e| EngineError::upstream(SERVICE, format!("malformed payload: {e}")))
}

fn parse_ingredient_search(body: &str) -> EngineResult<Vec<RecipeSummary>> {
    decode(body)
}

fn parse_cuisine_search(body: &str) -> EngineResult<Vec<RecipeSummary>> {
    Ok(decode::<SearchPage>(body)?.results)
}

/// Steps of every instruction block, in order.
fn parse_steps(body: &str) -> EngineResult<Vec<RecipeStep>> {
    let blocks: Vec<InstructionBlock> = decode(body)?;
    Ok(blocks
        .into_iter()
        .flat_map(|b| b.steps)
        .map(|s| RecipeStep {
            equipment: s.equipment.into_iter().map(|e| e.name).collect(),
            action: s.step,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingredient_search_reads_numeric_ids() {
        let body = r#"[
            {"id": 641803, "title": "Easy Chicken Rice", "usedIngredientCount": 2},
            {"id": 715538, "title": "Fried Rice", "missedIngredientCount": 1}
        ]"#;
        let found = parse_ingredient_search(body).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "641803");
        assert_eq!(found[1].title, "Fried Rice");
    }

    #[test]
    fn cuisine_search_reads_results_field() {
        let body = r#"{"results": [{"id": 1, "title": "Pad Thai", "readyInMinutes": 30}], "totalResults": 1}"#;
        let found = parse_cuisine_search(body).unwrap();
        assert_eq!(found, vec![RecipeSummary { id: "1".into(), title: "Pad Thai".into() }]);
        assert!(parse_cuisine_search("{}").unwrap().is_empty());
    }

    #[test]
    fn info_uses_ready_in_minutes() {
        let info: RecipeInfo =
            serde_json::from_str(r#"{"title": "Stew", "servings": 4, "readyInMinutes": 90, "vegan": false}"#)
                .unwrap();
        assert_eq!(info.ready_minutes, 90);
        assert_eq!(info.servings, 4);
    }

    #[test]
    fn steps_flatten_blocks_and_equipment() {
        let body = r#"[
            {"name": "", "steps": [
                {"number": 1, "step": "Boil water.", "equipment": [{"id": 1, "name": "pot"}]},
                {"number": 2, "step": "Add rice.", "equipment": []}
            ]},
            {"name": "Sauce", "steps": [
                {"number": 1, "step": "Whisk.", "equipment": [{"name": "bowl"}, {"name": "whisk"}]}
            ]}
        ]"#;
        let steps = parse_steps(body).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].equipment, vec!["pot"]);
        assert!(steps[1].equipment.is_empty());
        assert_eq!(steps[2].action, "Whisk.");
        assert_eq!(steps[2].equipment, vec!["bowl", "whisk"]);
    }

    #[test]
    fn no_instructions_is_empty() {
        assert!(parse_steps("[]").unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_is_upstream_error() {
        let err = parse_ingredient_search("<html>").unwrap_err();
        assert!(err.is_upstream());
        assert!(parse_cuisine_search(r#""results""#).unwrap_err().is_upstream());
        assert!(parse_steps(r#"{"error": "quota"}"#).unwrap_err().is_upstream());
        assert!(decode::<RecipeInfo>("").unwrap_err().is_upstream());
    }
}
