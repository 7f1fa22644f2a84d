mod app;
mod classifier;
mod config;
mod console;
mod dom;
mod domain;
mod feed;
mod infrastructure;
mod pipeline;
mod relay;
mod settings;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories, &config.settings)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::FeedGuardApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await?;

    // The stdin reader runs on a blocking thread that never returns on its
    // own, so the runtime would hang waiting for it on drop.
    std::process::exit(0)
}
