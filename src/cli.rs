// Command line flags. Anything given here wins over config.json for this
// run only; nothing passed on the command line is saved back.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, SourceKind};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Where tracks come from: a folder of audio files or a JSON manifest of YouTube links
    #[arg(short, long, value_enum, env = "JUKEBOX_SOURCE")]
    pub source: Option<SourceKind>,

    /// Folder scanned for "Artist - Title.ext" files
    #[arg(short = 'd', long, env = "JUKEBOX_MUSIC_DIR")]
    pub music_dir: Option<PathBuf>,

    /// JSON manifest with artista / cancion / url entries
    #[arg(short, long, env = "JUKEBOX_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long, env = "JUKEBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Initial search filter
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Start with shuffle on
    #[arg(long)]
    pub shuffle: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "JUKEBOX_LOG")]
    pub log_level: Option<String>,

    /// Print the visible tracks and exit instead of starting the player
    #[arg(short, long)]
    pub list: bool,
}

impl Cli {
    pub fn apply(&self, config: &mut Config) {
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(dir) = &self.music_dir {
            config.music_dir = dir.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.manifest_path = manifest.clone();
        }
        if self.shuffle {
            config.shuffle = true;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "jukebox-tui",
            "--source",
            "manifest",
            "--manifest",
            "/tmp/list.json",
            "--shuffle",
        ]);
        let mut config = Config::default();

        cli.apply(&mut config);

        assert_eq!(config.source, SourceKind::Manifest);
        assert_eq!(config.manifest_path, PathBuf::from("/tmp/list.json"));
        assert!(config.shuffle);
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let cli = Cli::parse_from(["jukebox-tui", "--list"]);
        let before = Config {
            volume: 12,
            ..Config::default()
        };
        let mut config = before.clone();

        cli.apply(&mut config);

        assert!(cli.list);
        assert_eq!(config, before);
    }
}
