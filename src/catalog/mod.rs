// ==========================================
// CATALOG MODULE
// ==========================================
// The catalog is the sorted list of every track a source produced.
// It handles:
// - Turning raw source records into immutable Tracks (defaults applied once)
// - Sorting by (artist, title), case-insensitive, ties kept in input order
// - Answering "which indices match this filter"
// - Re-ordering a visible set for column sorting in the UI
//
// A track's identity is its index in the catalog. Indices stay valid
// until the next load; nothing else in the crate stores tracks by value.

pub mod folder;
pub mod manifest;
pub mod source;

use std::cmp::Ordering;

pub const UNKNOWN_ARTIST: &str = "(unknown)";
pub const UNTITLED: &str = "(untitled)";

// ==========================================
// RAW RECORD
// ==========================================
// What a catalog source hands over. Every field is optional; a record
// without a usable playable reference is dropped at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrackRecord {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub playable_ref: Option<String>,
}

impl RawTrackRecord {
    #[cfg(test)]
    pub fn new(
        artist: Option<impl Into<String>>,
        title: Option<impl Into<String>>,
        playable_ref: Option<impl Into<String>>,
    ) -> Self {
        RawTrackRecord {
            artist: artist.map(Into::into),
            title: title.map(Into::into),
            playable_ref: playable_ref.map(Into::into),
        }
    }
}

// ==========================================
// TRACK
// ==========================================
// playable_ref is either a local file path or a YouTube URL/id,
// depending on which source produced the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub artist: String,
    pub title: String,
    pub playable_ref: String,
}

impl Track {
    /// Resolves defaults for a raw record. Returns `None` when the record has
    /// no playable reference.
    pub fn from_raw(raw: RawTrackRecord) -> Option<Self> {
        let playable_ref = non_blank(raw.playable_ref)?;
        Some(Track {
            artist: non_blank(raw.artist).unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            title: non_blank(raw.title).unwrap_or_else(|| UNTITLED.to_string()),
            playable_ref,
        })
    }

    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ==========================================
// CATALOG
// ==========================================
// tracks and the lowercase search keys are parallel vectors: keys[i]
// belongs to tracks[i].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
    keys: Vec<(String, String)>,
}

impl Catalog {
    /// Builds a catalog from raw records, skipping the ones that cannot
    /// become a Track. Also returns how many were skipped.
    pub fn load<I>(records: I) -> (Self, usize)
    where
        I: IntoIterator<Item = RawTrackRecord>,
    {
        let mut skipped = 0;
        let mut tracks: Vec<Track> = records
            .into_iter()
            .filter_map(|raw| {
                let track = Track::from_raw(raw);
                if track.is_none() {
                    skipped += 1;
                }
                track
            })
            .collect();

        // sort_by_cached_key is stable, so equal keys keep input order
        tracks.sort_by_cached_key(|t| (t.artist.to_lowercase(), t.title.to_lowercase()));

        let keys = tracks
            .iter()
            .map(|t| (t.artist.to_lowercase(), t.title.to_lowercase()))
            .collect();

        (Catalog { tracks, keys }, skipped)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    #[cfg(test)]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Catalog indices whose artist or title contains `filter`
    /// (trimmed, case-insensitive), in catalog order.
    pub fn filter(&self, filter: &str) -> Vec<usize> {
        let needle = filter.trim().to_lowercase();
        if needle.is_empty() {
            return (0..self.tracks.len()).collect();
        }

        self.keys
            .iter()
            .enumerate()
            .filter(|(_, (artist, title))| artist.contains(&needle) || title.contains(&needle))
            .map(|(i, _)| i)
            .collect()
    }

    /// Re-orders a visible set for display. `ViewSort::Catalog` leaves it
    /// untouched.
    pub fn sort_view(&self, visible: &[usize], sort: ViewSort) -> Vec<usize> {
        let mut order = visible.to_vec();
        let column = match sort.column() {
            Some(column) => column,
            None => return order,
        };

        order.sort_by(|&a, &b| {
            let ordering = self.compare(a, b, column);
            if sort.is_descending() {
                ordering.reverse()
            } else {
                ordering
            }
        });
        order
    }

    fn compare(&self, a: usize, b: usize, column: SortColumn) -> Ordering {
        let (artist_a, title_a) = &self.keys[a];
        let (artist_b, title_b) = &self.keys[b];
        match column {
            SortColumn::Artist => artist_a.cmp(artist_b).then_with(|| title_a.cmp(title_b)),
            SortColumn::Title => title_a.cmp(title_b).then_with(|| artist_a.cmp(artist_b)),
        }
        .then_with(|| a.cmp(&b))
    }
}

// ==========================================
// VIEW SORT
// ==========================================
// The table's column sort. Cycles through the states with `next()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewSort {
    #[default]
    Catalog,
    ArtistAsc,
    ArtistDesc,
    TitleAsc,
    TitleDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortColumn {
    Artist,
    Title,
}

impl ViewSort {
    pub fn next(self) -> Self {
        match self {
            ViewSort::Catalog => ViewSort::ArtistAsc,
            ViewSort::ArtistAsc => ViewSort::ArtistDesc,
            ViewSort::ArtistDesc => ViewSort::TitleAsc,
            ViewSort::TitleAsc => ViewSort::TitleDesc,
            ViewSort::TitleDesc => ViewSort::Catalog,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewSort::Catalog => "default",
            ViewSort::ArtistAsc => "artist ↑",
            ViewSort::ArtistDesc => "artist ↓",
            ViewSort::TitleAsc => "title ↑",
            ViewSort::TitleDesc => "title ↓",
        }
    }

    fn column(self) -> Option<SortColumn> {
        match self {
            ViewSort::Catalog => None,
            ViewSort::ArtistAsc | ViewSort::ArtistDesc => Some(SortColumn::Artist),
            ViewSort::TitleAsc | ViewSort::TitleDesc => Some(SortColumn::Title),
        }
    }

    fn is_descending(self) -> bool {
        matches!(self, ViewSort::ArtistDesc | ViewSort::TitleDesc)
    }
}
