use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use tangram_game_server::config::ServerConfig;
use tangram_game_server::network::server;
use tangram_game_server::stimuli::catalog::StimulusCatalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let catalog = StimulusCatalog::load_from_file(&config.catalog_path)
        .with_context(|| format!("failed to load catalog {}", config.catalog_path.display()))?;
    info!(
        "Starting experiment {} with {} stimuli",
        config.game.experiment_name,
        catalog.len()
    );

    server::run(&config, Arc::new(catalog))
        .await
        .with_context(|| format!("server on {} stopped", config.bind_addr))
}
