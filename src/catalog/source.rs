// Catalog sources: where raw track records come from.
// The folder scanner and the manifest reader both implement CatalogSource;
// the app only sees the trait.

use crate::catalog::RawTrackRecord;
use crate::error::LibraryError;

/// What a source produced in one fetch.
#[derive(Debug, Default)]
pub struct SourceReport {
    pub records: Vec<RawTrackRecord>,
    /// Entries that were present but unusable (bad shape, wrong type).
    pub skipped: usize,
    /// Things the user should be told about, e.g. "template created".
    pub notices: Vec<String>,
}

pub trait CatalogSource {
    /// Short human description, e.g. "folder ~/Music/jukebox".
    fn describe(&self) -> String;

    /// Reads every raw record. Per-entry problems are counted in
    /// `SourceReport::skipped`; only whole-source failures are errors.
    fn fetch(&self) -> Result<SourceReport, LibraryError>;

    /// Location to hand to the system file opener.
    fn location(&self) -> std::path::PathBuf;
}
