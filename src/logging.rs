// Logging setup
// The terminal belongs to the TUI, so logs go to a file:
//   ~/.local/share/jukebox-tui/jukebox.log   (Linux)
// RUST_LOG takes precedence over the configured level.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::APP_DIR;

pub fn log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("jukebox.log")
}

/// Installs the global subscriber. Returns the log file in use, or `None`
/// when it could not be opened and logs go to stderr instead.
pub fn init(level: &str) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("jukebox_tui={}", level)))
        .unwrap_or_else(|_| EnvFilter::new("jukebox_tui=info"));

    let path = log_path();
    let file = path
        .parent()
        .map(fs::create_dir_all)
        .transpose()
        .ok()
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path).ok());

    match file {
        Some(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
                .init();
            Some(path)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
