// ==========================================
// MANIFEST SOURCE
// ==========================================
// Reads a JSON list of tracks, each pointing at a YouTube link:
//
//   [
//     { "artista": "Rick Astley", "cancion": "Never Gonna Give You Up",
//       "url": "https://youtu.be/dQw4w9WgXcQ" }
//   ]
//
// English keys (artist / title) are accepted as well; when an entry has
// both, the Spanish one wins. When the file does not exist a one-entry
// template is written so the user has something to edit, and the catalog
// starts out empty.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::source::{CatalogSource, SourceReport};
use crate::catalog::RawTrackRecord;
use crate::error::LibraryError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "artista", alias = "artist", default)]
    pub artist: Option<String>,
    #[serde(rename = "cancion", alias = "title", default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl From<ManifestEntry> for RawTrackRecord {
    fn from(entry: ManifestEntry) -> Self {
        RawTrackRecord {
            artist: entry.artist,
            title: entry.title,
            playable_ref: entry.url,
        }
    }
}

pub fn template() -> Vec<ManifestEntry> {
    vec![ManifestEntry {
        artist: Some("Rick Astley".to_string()),
        title: Some("Never Gonna Give You Up".to_string()),
        url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
    }]
}

// serde rejects an entry that carries a field under both its name and
// its alias, so the alias is removed first.
fn drop_shadowed_aliases(object: &mut serde_json::Map<String, serde_json::Value>) {
    for (name, alias) in [("artista", "artist"), ("cancion", "title")] {
        if object.contains_key(name) {
            object.remove(alias);
        }
    }
}

pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ManifestSource { path: path.into() }
    }

    fn write_template(&self) -> Result<(), LibraryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LibraryError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&template()).map_err(|e| LibraryError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        fs::write(&self.path, json).map_err(|e| LibraryError::io(&self.path, e))
    }
}

impl CatalogSource for ManifestSource {
    fn describe(&self) -> String {
        format!("manifest {}", self.path.display())
    }

    fn fetch(&self) -> Result<SourceReport, LibraryError> {
        let mut report = SourceReport::default();

        if !self.path.exists() {
            self.write_template()?;
            info!(path = %self.path.display(), "wrote manifest template");
            report.notices.push(format!(
                "Created {} with an example. Add your own links there",
                self.path.display()
            ));
            return Ok(report);
        }

        let text = fs::read_to_string(&self.path).map_err(|e| LibraryError::io(&self.path, e))?;
        let document: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| LibraryError::Json {
                path: self.path.clone(),
                source: e,
            })?;

        let entries = match document {
            serde_json::Value::Array(entries) => entries,
            _ => return Err(LibraryError::NotAList(self.path.clone())),
        };

        for (position, value) in entries.into_iter().enumerate() {
            let serde_json::Value::Object(mut object) = value else {
                warn!(position, "manifest entry is not an object, skipping");
                report.skipped += 1;
                continue;
            };
            drop_shadowed_aliases(&mut object);
            match serde_json::from_value::<ManifestEntry>(serde_json::Value::Object(object)) {
                Ok(entry) if entry.url.as_deref().is_some_and(|u| !u.trim().is_empty()) => {
                    report.records.push(entry.into());
                }
                Ok(_) => {
                    warn!(position, "manifest entry has no url, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(position, error = %e, "malformed manifest entry, skipping");
                    report.skipped += 1;
                }
            }
        }

        info!(
            path = %self.path.display(),
            tracks = report.records.len(),
            skipped = report.skipped,
            "read manifest"
        );
        Ok(report)
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}
