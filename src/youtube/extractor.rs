// YouTube link resolution
// Turns a manifest URL into a video id, then into something playable:
// either an mp3 in the cache (yt-dlp subprocess) or a browser tab.

use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::ResolveError;

const VIDEO_ID_LEN: usize = 11;

/// Pulls the video id out of the URL shapes people paste:
/// `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `/shorts/<id>`,
/// `/embed/<id>`, or a bare id.
pub fn extract_video_id(reference: &str) -> Result<String, ResolveError> {
    let reference = reference.trim();

    if is_bare_id(reference) {
        return Ok(reference.to_string());
    }

    let without_scheme = reference
        .strip_prefix("https://")
        .or_else(|| reference.strip_prefix("http://"))
        .unwrap_or(reference);

    let (host, rest) = without_scheme
        .split_once('/')
        .unwrap_or((without_scheme, ""));
    let host = host.to_ascii_lowercase();
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };
    let query = query.split('#').next().unwrap_or("");
    let path = path.split('#').next().unwrap_or("");

    let candidate = if host == "youtu.be" || host.ends_with(".youtu.be") {
        first_segment(path)
    } else if host == "youtube.com" || host.ends_with(".youtube.com") {
        if path == "watch" {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("v="))
        } else if let Some(id) = path.strip_prefix("shorts/") {
            first_segment(id)
        } else if let Some(id) = path.strip_prefix("embed/") {
            first_segment(id)
        } else {
            None
        }
    } else {
        None
    };

    let id = candidate.ok_or_else(|| ResolveError::UnrecognizedUrl(reference.to_string()))?;
    if is_valid_id_chars(id) {
        Ok(id.to_string())
    } else {
        Err(ResolveError::InvalidVideoId(id.to_string()))
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn first_segment(path: &str) -> Option<&str> {
    path.split('/').next().filter(|s| !s.is_empty())
}

fn is_valid_id_chars(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_bare_id(reference: &str) -> bool {
    reference.len() == VIDEO_ID_LEN && is_valid_id_chars(reference)
}

// ==========================================
// AUDIO FETCHING
// ==========================================
// yt-dlp extracts the audio track to <cache>/<id>.mp3. Already-cached ids
// are not fetched again.
#[derive(Debug, Clone)]
pub struct YouTubeExtractor {
    yt_dlp: String,
    cache_dir: PathBuf,
}

impl YouTubeExtractor {
    pub fn new(yt_dlp: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        YouTubeExtractor {
            yt_dlp: yt_dlp.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cached_path(&self, video_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.mp3", video_id))
    }

    /// Blocking; run it from `spawn_blocking`.
    pub fn fetch_audio(&self, video_id: &str) -> Result<PathBuf, ResolveError> {
        let target = self.cached_path(video_id);
        if target.is_file() {
            debug!(id = video_id, "audio already cached");
            return Ok(target);
        }

        std::fs::create_dir_all(&self.cache_dir)
            .map_err(|e| ResolveError::Extractor(format!("cannot create cache dir: {}", e)))?;

        info!(id = video_id, "fetching audio with yt-dlp");
        let output_template = self.cache_dir.join("%(id)s.%(ext)s");
        let output = Command::new(&self.yt_dlp)
            .arg("--no-playlist")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("-o")
            .arg(&output_template)
            .arg(watch_url(video_id))
            .output()
            .map_err(|e| {
                ResolveError::Extractor(format!(
                    "failed to run {}: {}. Is yt-dlp installed?",
                    self.yt_dlp, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(id = video_id, stderr = %stderr.trim(), "yt-dlp failed");
            return Err(ResolveError::Extractor(last_line(&stderr)));
        }

        if target.is_file() {
            Ok(target)
        } else {
            Err(ResolveError::Extractor(format!(
                "yt-dlp finished but {} is missing",
                target.display()
            )))
        }
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_short_links() {
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc&t=42").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_watch_links() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://music.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ#t=3").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("http://youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_shorts_and_embed() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/abcdefghijk").unwrap(),
            "abcdefghijk"
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/abcdefghijk?autoplay=1").unwrap(),
            "abcdefghijk"
        );
    }

    #[test]
    fn accepts_bare_ids() {
        assert_eq!(extract_video_id(" dQw4w9WgXcQ ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn rejects_other_shapes() {
        for bad in [
            "https://vimeo.com/12345",
            "https://www.youtube.com/channel/UC123",
            "https://www.youtube.com/watch?list=PL1",
            "https://youtu.be/",
            "not a link",
            "",
        ] {
            assert!(
                matches!(extract_video_id(bad), Err(ResolveError::UnrecognizedUrl(_))),
                "{bad} should be unrecognized"
            );
        }
    }

    #[test]
    fn rejects_ids_with_bad_characters() {
        assert!(matches!(
            extract_video_id("https://youtu.be/abc$def"),
            Err(ResolveError::InvalidVideoId(_))
        ));
    }

    #[test]
    fn cached_audio_is_reused() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("dQw4w9WgXcQ.mp3"), b"cached").unwrap();
        let extractor = YouTubeExtractor::new("definitely-not-yt-dlp", dir.path());

        let path = extractor.fetch_audio("dQw4w9WgXcQ").unwrap();

        assert_eq!(path, dir.path().join("dQw4w9WgXcQ.mp3"));
    }

    #[test]
    fn missing_yt_dlp_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let extractor = YouTubeExtractor::new("definitely-not-yt-dlp", dir.path());

        assert!(matches!(
            extractor.fetch_audio("dQw4w9WgXcQ"),
            Err(ResolveError::Extractor(_))
        ));
    }
}
