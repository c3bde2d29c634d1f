// ==========================================
// FOLDER SOURCE
// ==========================================
// Scans one directory (not recursive) for audio files and turns each into
// a raw record. File names are expected as "Artist - Title.ext"; a name
// without the separator becomes an unknown-artist track titled by its stem.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::source::{CatalogSource, SourceReport};
use crate::catalog::RawTrackRecord;
use crate::error::LibraryError;

/// Extensions the scanner picks up (compared lowercase).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "wma", "ogg", "flac"];

const NAME_SEPARATOR: &str = " - ";

pub struct FolderSource {
    dir: PathBuf,
}

impl FolderSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FolderSource { dir: dir.into() }
    }
}

impl CatalogSource for FolderSource {
    fn describe(&self) -> String {
        format!("folder {}", self.dir.display())
    }

    fn fetch(&self) -> Result<SourceReport, LibraryError> {
        let mut report = SourceReport::default();

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| LibraryError::io(&self.dir, e))?;
            info!(dir = %self.dir.display(), "created music folder");
            report
                .notices
                .push(format!("Created {}. Put your songs there", self.dir.display()));
            return Ok(report);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| LibraryError::io(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_audio_file(path))
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                report.skipped += 1;
                continue;
            };
            let (artist, title) = parse_file_stem(&stem);
            let absolute = fs::canonicalize(&path).unwrap_or(path);
            debug!(file = %absolute.display(), "found track");

            report.records.push(RawTrackRecord {
                artist,
                title: Some(title),
                playable_ref: Some(absolute.to_string_lossy().into_owned()),
            });
        }

        info!(
            dir = %self.dir.display(),
            tracks = report.records.len(),
            "scanned music folder"
        );
        Ok(report)
    }

    fn location(&self) -> PathBuf {
        self.dir.clone()
    }
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Splits "Artist - Title" on the first separator. Without a separator the
/// artist is left unset.
pub fn parse_file_stem(stem: &str) -> (Option<String>, String) {
    match stem.split_once(NAME_SEPARATOR) {
        Some((artist, title)) => (Some(artist.trim().to_string()), title.trim().to_string()),
        None => (None, stem.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_artist_and_title() {
        assert_eq!(
            parse_file_stem("Daft Punk - One More Time"),
            (Some("Daft Punk".to_string()), "One More Time".to_string())
        );
    }

    #[test]
    fn splits_on_first_separator_only() {
        assert_eq!(
            parse_file_stem("AC/DC - Back In Black - Live"),
            (Some("AC/DC".to_string()), "Back In Black - Live".to_string())
        );
    }

    #[test]
    fn name_without_separator_has_no_artist() {
        assert_eq!(parse_file_stem("intro"), (None, "intro".to_string()));
    }

    #[test]
    fn recognizes_extensions_case_insensitively() {
        assert!(is_audio_file(Path::new("a.MP3")));
        assert!(is_audio_file(Path::new("b.ogg")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("README")));
    }

    #[test]
    fn fetch_lists_only_audio_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Queen - Bicycle.mp3"), b"").unwrap();
        fs::write(dir.path().join("loose track.wav"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();

        let report = FolderSource::new(dir.path()).fetch().unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].artist.as_deref(), Some("Queen"));
        assert_eq!(report.records[0].title.as_deref(), Some("Bicycle"));
        assert_eq!(report.records[1].artist, None);
        assert_eq!(report.records[1].title.as_deref(), Some("loose track"));
        assert!(report.records.iter().all(|r| r.playable_ref.is_some()));
    }

    #[test]
    fn fetch_creates_missing_folder() {
        let dir = TempDir::new().unwrap();
        let songs = dir.path().join("songs");

        let report = FolderSource::new(&songs).fetch().unwrap();

        assert!(songs.is_dir());
        assert!(report.records.is_empty());
        assert_eq!(report.notices.len(), 1);
    }
}
