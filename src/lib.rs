// SousChef: bot daemon.
// Loads configuration, opens the graph store, wires the dialogue controller
// to its collaborators and serves it over Telegram until Ctrl-C.

pub mod engine;

use log::info;
use souschef_core::{build_controller, EngineResult, GraphStore, SousChefConfig};
use std::sync::Arc;

pub async fn run() -> EngineResult<()> {
    let config = SousChefConfig::load(None)?;
    config.validate()?;
    config.validate_telegram()?;

    let store = Arc::new(GraphStore::open(&config.db_path())?);
    let controller = Arc::new(build_controller(&config, store)?);
    info!(
        "[souschef] Ready, offering up to {} recipes per search",
        config.dialogue.max_recipes
    );

    engine::telegram::run_bridge(controller, config.telegram.clone()).await
}
