//! Canonical video-id extraction from arbitrary URL shapes.
//!
//! Normalization is pure and total: input the function cannot parse is
//! returned unchanged as the identifier, so a bare id round-trips and a
//! malformed URL never aborts a lookup.

use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\n?#/]+)",
        r"youtube\.com/embed/([^&\n?#/]+)",
        r"youtube\.com/v/([^&\n?#/]+)",
        r"youtube\.com/shorts/([^&\n?#/]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("hardcoded pattern must compile"))
    .collect()
});

/// Extracts the canonical video id from a bare id or any supported URL shape.
///
/// Supported shapes: `watch?v=`, `youtu.be/`, `/embed/`, `/v/`, `/shorts/`.
/// Anything else passes through unchanged.
#[must_use]
pub fn extract_video_id(video_ref: &str) -> String {
    for pattern in URL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(video_ref) {
            if let Some(id) = caps.get(1) {
                return id.as_str().to_owned();
            }
        }
    }
    video_ref.to_owned()
}

/// Whether the reference points at a YouTube Short.
#[must_use]
pub fn is_shorts_url(video_ref: &str) -> bool {
    video_ref.contains("/shorts/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_watch_url_with_extra_params() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_short_link() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_v_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/v/dQw4w9WgXcQ?version=3"),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn extracts_from_shorts_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/shorts/abc123XYZ_-"),
            "abc123XYZ_-"
        );
    }

    #[test]
    fn bare_id_passes_through() {
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn unparseable_input_passes_through_unchanged() {
        assert_eq!(
            extract_video_id("https://example.com/not-youtube"),
            "https://example.com/not-youtube"
        );
        assert_eq!(extract_video_id(""), "");
    }

    #[test]
    fn detects_shorts_urls() {
        assert!(is_shorts_url("https://www.youtube.com/shorts/abc"));
        assert!(!is_shorts_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_shorts_url("abc"));
    }
}
