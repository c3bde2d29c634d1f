// Error types shared across the jukebox
//
// Two families:
// - LibraryError: something went wrong while reading a catalog source.
//   The UI turns these into a status notice and keeps running with
//   whatever was loaded.
// - ResolveError: a single track could not be turned into something the
//   sink can play. Reported per play attempt.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest {0} must contain a JSON list of tracks")]
    NotAList(PathBuf),
}

impl LibraryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LibraryError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("not a recognized YouTube link: {0}")]
    UnrecognizedUrl(String),

    #[error("invalid YouTube video id: {0}")]
    InvalidVideoId(String),

    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("yt-dlp failed: {0}")]
    Extractor(String),

    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("could not decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
}
