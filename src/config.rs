// Persisted settings
// Stored as JSON in the platform config dir:
//   ~/.config/jukebox-tui/config.json   (Linux)
// Every field has a default so hand-edited partial files still load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const APP_DIR: &str = "jukebox-tui";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Folder,
    Manifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum YouTubeMode {
    /// Extract audio with yt-dlp and play it locally.
    #[default]
    Download,
    /// Hand the watch URL to the system browser.
    Browser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceKind,
    pub music_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub cache_dir: PathBuf,
    pub volume: u32,
    pub shuffle: bool,
    pub youtube_mode: YouTubeMode,
    pub yt_dlp: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = config_dir();
        Config {
            source: SourceKind::Folder,
            music_dir: dirs::audio_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("jukebox"),
            manifest_path: config_dir.join("tracks.json"),
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
            volume: 80,
            shuffle: false,
            youtube_mode: YouTubeMode::Download,
            yt_dlp: "yt-dlp".to_string(),
            log_level: "info".to_string(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

impl Config {
    /// Reads `path`, falling back to defaults when the file is missing or
    /// unreadable. Never fails; a broken file is logged and ignored.
    pub fn load_from(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{:#}", e),
                    "unusable config, using defaults"
                );
                Config::default()
            }
        }
    }

    /// `Ok(None)` when there is no config file yet.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config {}", path.display()))
            }
        };

        let mut config: Config = serde_json::from_str(&text)
            .with_context(|| format!("Malformed config {}", path.display()))?;
        config.volume = config.volume.min(100);
        Ok(Some(config))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }
}
