// ── SousChef Configuration ───────────────────────────────────────────────────
//
// One TOML file, every section optional. Secrets can come from the
// environment instead, and the environment wins over the file.
//
//   [store]       db_path
//   [dialogue]    max_recipes
//   [catalog]     base_url, api_key, timeout_secs, results
//   [classifier]  url, workspace_id, username, password, timeout_secs
//   [notify]      url, api_key
//   [telegram]    bot_token, enabled, poll_timeout_secs

use crate::atoms::constants::MAX_RECIPES;
use crate::atoms::error::{EngineError, EngineResult};
use crate::paths;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SousChefConfig {
    pub store: StoreConfig,
    pub dialogue: DialogueConfig,
    pub catalog: CatalogConfig,
    pub classifier: ClassifierConfig,
    pub notify: NotifyConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Defaults to `souschef.db` in the data directory.
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    pub max_recipes: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self { max_recipes: MAX_RECIPES }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    /// `number` parameter sent with searches.
    pub results: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://spoonacular-recipe-food-nutrition-v1.p.mashape.com".into(),
            api_key: String::new(),
            timeout_secs: 20,
            results: MAX_RECIPES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub url: String,
    pub workspace_id: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: "https://gateway.watsonplatform.net/conversation/api".into(),
            workspace_id: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 20,
        }
    }
}

/// An empty `url` disables notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub url: String,
    pub api_key: String,
}

impl NotifyConfig {
    pub fn enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub enabled: bool,
    /// Long-poll timeout passed to getUpdates.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            enabled: true,
            poll_timeout_secs: 30,
        }
    }
}

impl SousChefConfig {
    /// Load from `path`, else `$SOUSCHEF_CONFIG`, else the default location,
    /// then apply environment overrides. A missing file means defaults.
    pub fn load(path: Option<&Path>) -> EngineResult<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SOUSCHEF_CONFIG").map(PathBuf::from))
            .unwrap_or_else(paths::default_config_path);

        let mut config = if path.exists() {
            info!("[config] Loading {:?}", path);
            Self::from_toml(&std::fs::read_to_string(&path)?)?
        } else {
            debug!("[config] No config at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> EngineResult<Self> {
        Ok(toml::from_str::<Self>(content)?)
    }

    /// Overlay values from a variable lookup (the process environment in
    /// production). Empty values are ignored.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SPOONACULAR_KEY") {
            self.catalog.api_key = v;
        }
        if let Some(v) = get("CONVERSATION_USERNAME") {
            self.classifier.username = v;
        }
        if let Some(v) = get("CONVERSATION_PASSWORD") {
            self.classifier.password = v;
        }
        if let Some(v) = get("CONVERSATION_WORKSPACE_ID") {
            self.classifier.workspace_id = v;
        }
        if let Some(v) = get("CONVERSATION_URL") {
            self.classifier.url = v;
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("NOTIFY_API_URL") {
            self.notify.url = v;
        }
        if let Some(v) = get("NOTIFY_API_KEY") {
            self.notify.api_key = v;
        }
        if let Some(v) = get("SOUSCHEF_DB") {
            self.store.db_path = Some(PathBuf::from(v));
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.store
            .db_path
            .clone()
            .unwrap_or_else(paths::default_db_path)
    }

    /// Check everything the dialogue needs before connecting anywhere.
    pub fn validate(&self) -> EngineResult<()> {
        let mut missing = Vec::new();
        if self.catalog.api_key.is_empty() {
            missing.push("catalog.api_key (SPOONACULAR_KEY)");
        }
        if self.classifier.workspace_id.is_empty() {
            missing.push("classifier.workspace_id (CONVERSATION_WORKSPACE_ID)");
        }
        if self.classifier.username.is_empty() {
            missing.push("classifier.username (CONVERSATION_USERNAME)");
        }
        if self.classifier.password.is_empty() {
            missing.push("classifier.password (CONVERSATION_PASSWORD)");
        }
        if !missing.is_empty() {
            return Err(EngineError::Config(format!("missing {}", missing.join(", "))));
        }

        if self.dialogue.max_recipes == 0 {
            return Err(EngineError::Config("dialogue.max_recipes must be at least 1".into()));
        }
        if self.notify.enabled() && self.notify.api_key.is_empty() {
            return Err(EngineError::Config(
                "notify.api_key (NOTIFY_API_KEY) is required when notify.url is set".into(),
            ));
        }
        Ok(())
    }

    /// Additional checks for running the Telegram bridge.
    pub fn validate_telegram(&self) -> EngineResult<()> {
        if !self.telegram.enabled {
            return Err(EngineError::Config("telegram.enabled is false".into()));
        }
        if self.telegram.bot_token.is_empty() {
            return Err(EngineError::Config(
                "missing telegram.bot_token (TELEGRAM_BOT_TOKEN)".into(),
            ));
        }
        Ok(())
    }
}
