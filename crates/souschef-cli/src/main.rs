//! `souschef-admin`: maintenance and local testing for a SousChef store.
//!
//! ```bash
//! souschef-admin stats
//! souschef-admin favorites 123456789 --limit 10
//! souschef-admin recommend ingredient "chicken, rice"
//! souschef-admin purge --users 123456789 --ingredient "beef,onion" --recipes 163864
//! souschef-admin chat --user local
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use souschef_core::atoms::types::{EntityKind, RankedEntity};
use souschef_core::dialogue::reply::FALLBACK;
use souschef_core::{build_controller, EngineResult, EntityStore, GraphStore, SousChefConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "souschef-admin")]
#[command(version)]
#[command(about = "Inspect and maintain the SousChef recommendation store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, global = true, env = "SOUSCHEF_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides the configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum AnchorKind {
    Ingredient,
    Cuisine,
}

impl From<AnchorKind> for EntityKind {
    fn from(kind: AnchorKind) -> Self {
        match kind {
            AnchorKind::Ingredient => EntityKind::Ingredient,
            AnchorKind::Cuisine => EntityKind::Cuisine,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Delete entities (and every relation touching them) by key
    Purge {
        /// User ids, comma separated
        #[arg(long, value_delimiter = ',')]
        users: Vec<String>,

        /// One ingredient list per flag, e.g. --ingredient "beef,onion"
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,

        /// Cuisine names, comma separated
        #[arg(long, value_delimiter = ',')]
        cuisines: Vec<String>,

        /// Recipe ids, comma separated
        #[arg(long, value_delimiter = ',')]
        recipes: Vec<String>,
    },

    /// A user's most selected recipes
    Favorites {
        user_id: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Recipes most often chosen after an ingredient list or cuisine
    Recommend {
        #[arg(value_enum)]
        kind: AnchorKind,

        text: String,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Entity and relation counts
    Stats,

    /// Talk to the bot from the terminal using the configured services
    Chat {
        /// User id to chat as
        #[arg(long, default_value = "console")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> EngineResult<()> {
    let mut config = SousChefConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.db_path = Some(db);
    }
    let store = Arc::new(GraphStore::open(&config.db_path())?);

    match cli.command {
        Commands::Purge { users, ingredients, cuisines, recipes } => {
            let groups = [
                (EntityKind::User, users),
                (EntityKind::Ingredient, ingredients),
                (EntityKind::Cuisine, cuisines),
                (EntityKind::Recipe, recipes),
            ];
            let mut outcome = Vec::new();
            for (kind, raw) in groups {
                if raw.is_empty() {
                    continue;
                }
                let keys: Vec<String> = raw.iter().map(|k| kind.canonical_key(k)).collect();
                let removed = store.delete_by_keys(kind, &keys)?;
                outcome.push((kind, removed, keys.len()));
            }
            println!("{}", purge_report(&outcome, cli.json));
        }

        Commands::Favorites { user_id, limit } => {
            let key = EntityKind::User.canonical_key(&user_id);
            let ranked = match store.find_by_key(EntityKind::User, &key)? {
                Some(user) => store.rank_relations_by_target(&user.id, EntityKind::Recipe, limit)?,
                None => Vec::new(),
            };
            print_ranked(&ranked, cli.json)?;
        }

        Commands::Recommend { kind, text, limit } => {
            let kind = EntityKind::from(kind);
            let key = kind.canonical_key(&text);
            let ranked = store.find_recommended_for(&key, kind, None, limit)?;
            print_ranked(&ranked, cli.json)?;
        }

        Commands::Stats => {
            let stats = store.stats()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("users        {}", stats.users);
                println!("ingredients  {}", stats.ingredients);
                println!("cuisines     {}", stats.cuisines);
                println!("recipes      {}", stats.recipes);
                println!("relations    {}", stats.relations);
            }
        }

        Commands::Chat { user } => {
            config.validate()?;
            let controller = build_controller(&config, store)?;
            println!("Chatting as '{user}'. Ctrl-D to quit.");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                match controller.handle_turn(&user, text).await {
                    Ok(reply) => println!("{reply}\n"),
                    Err(e) => {
                        log::error!("[chat] {}", e);
                        println!("{FALLBACK}\n");
                    }
                }
            }
        }
    }
    Ok(())
}

/// One line per purged kind, or a single JSON object with `--json`.
fn purge_report(outcome: &[(EntityKind, usize, usize)], json: bool) -> String {
    let total: usize = outcome.iter().map(|(_, removed, _)| removed).sum();
    if json {
        let kinds: Vec<_> = outcome
            .iter()
            .map(|(kind, removed, requested)| {
                serde_json::json!({ "kind": kind.as_str(), "removed": removed, "requested": requested })
            })
            .collect();
        return serde_json::json!({ "removed": total, "kinds": kinds }).to_string();
    }
    if outcome.is_empty() {
        return "Nothing to purge.".to_string();
    }
    outcome
        .iter()
        .map(|(kind, removed, requested)| format!("{kind}: removed {removed} of {requested}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_ranked(ranked: &[RankedEntity], json: bool) -> EngineResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ranked)?);
        return Ok(());
    }
    if ranked.is_empty() {
        println!("(none)");
    }
    for (i, r) in ranked.iter().enumerate() {
        let title = r.entity.title.as_deref().unwrap_or(&r.entity.key);
        println!("{}. {} [{}] ×{}", i + 1, title, r.entity.key, r.count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn purge_splits_simple_lists_but_not_ingredients() {
        let cli = Cli::parse_from([
            "souschef-admin",
            "purge",
            "--users",
            "U1,U2",
            "--ingredient",
            "beef,onion",
            "--ingredient",
            "pork",
        ]);
        match cli.command {
            Commands::Purge { users, ingredients, cuisines, .. } => {
                assert_eq!(users, vec!["U1", "U2"]);
                assert_eq!(ingredients, vec!["beef,onion", "pork"]);
                assert!(cuisines.is_empty());
            }
            _ => panic!("expected purge"),
        }
    }

    #[test]
    fn purge_json_report_is_a_single_object() {
        let outcome = [(EntityKind::User, 1, 2), (EntityKind::Ingredient, 1, 1)];
        let report = purge_report(&outcome, true);
        let parsed: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(parsed["removed"], 2);
        assert_eq!(parsed["kinds"][0]["kind"], "user");
        assert_eq!(parsed["kinds"][0]["requested"], 2);
        assert!(!report.contains('\n'));
    }

    #[test]
    fn purge_text_report_lists_each_kind() {
        let outcome = [(EntityKind::User, 1, 2), (EntityKind::Cuisine, 0, 1)];
        assert_eq!(purge_report(&outcome, false), "user: removed 1 of 2\ncuisine: removed 0 of 1");
        assert_eq!(purge_report(&[], false), "Nothing to purge.");
    }

    #[test]
    fn recommend_takes_kind_and_text() {
        let cli = Cli::parse_from(["souschef-admin", "--json", "recommend", "cuisine", "Thai", "--limit", "3"]);
        assert!(cli.json);
        match cli.command {
            Commands::Recommend { kind, text, limit } => {
                assert_eq!(EntityKind::from(kind), EntityKind::Cuisine);
                assert_eq!(text, "Thai");
                assert_eq!(limit, 3);
            }
            _ => panic!("expected recommend"),
        }
    }
}
