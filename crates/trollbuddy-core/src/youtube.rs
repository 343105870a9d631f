//! `YouTube` URL validation and video id extraction.
//!
//! Accepted shapes: `youtube.com/watch?v=<id>`, `youtube.com/shorts/<id>` and
//! `youtu.be/<id>`, optionally with scheme, `www.`/`m.` prefix and trailing
//! `&...` query parameters. Video ids are exactly 11 characters.

use std::sync::LazyLock;

use regex::Regex;

static VALID_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|shorts/)|youtu\.be/)([a-zA-Z0-9_-]{11})(&.*)?$",
    )
    .expect("static regex is valid")
});

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/(?:watch\?v=|shorts/)|youtu\.be/)([a-zA-Z0-9_-]{11})")
        .expect("static regex is valid")
});

/// Length of a `YouTube` video id.
pub const VIDEO_ID_LEN: usize = 11;

/// Returns `true` if `url` is one of the accepted `YouTube` URL shapes.
pub fn is_valid_url(url: &str) -> bool {
    VALID_URL_RE.is_match(url.trim())
}

/// Extract the 11-character video id from a `YouTube` URL.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns `true` if `id` looks like a bare video id.
pub fn is_video_id(id: &str) -> bool {
    id.len() == VIDEO_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Embeddable player URL for a video id.
pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{video_id}")
}
