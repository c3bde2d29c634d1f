// Main entry point for the terminal jukebox
// Reads config + flags, sets up logging, then either prints the catalog
// (--list) or runs the TUI.

mod catalog;
mod cli;
mod config;
mod error;
mod logging;
mod player;
mod ui;
mod youtube;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use cli::Cli;
use config::Config;
use ui::app::JukeboxApp;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    // Logging needs the configured level, so a config problem is held
    // until the subscriber is up.
    let (mut config, config_error) = match Config::try_load(&config_path) {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (Config::default(), Some(e)),
    };
    cli.apply(&mut config);

    let log_file = logging::init(&config.log_level);
    if let Some(e) = config_error {
        warn!(error = %format!("{:#}", e), "unusable config, using defaults");
    }
    info!(
        config = %config_path.display(),
        log = ?log_file,
        source = ?config.source,
        "starting jukebox"
    );

    if cli.list {
        return ui::app::print_catalog(&config, cli.filter.as_deref());
    }

    // Suppress ALSA buffer warnings that would draw over the TUI
    std::env::set_var("ALSA_PCM_NO_MMAP", "1");

    let mut app = JukeboxApp::new(config, config_path, cli.filter.as_deref());
    app.run().await?;

    Ok(())
}
