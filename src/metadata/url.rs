use once_cell::sync::Lazy;
use regex::Regex;

static SUPPORTED_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(www\.)?(youtube\.com|youtu\.?be)/.+$").expect("supported url regex")
});

static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:watch\?v=|/videos/|/shorts/|embed/|youtu\.be/|/v/|/e/|watch\?v%3D|watch\?feature=player_embedded&v=|%2Fvideos%2F|embed%2F|youtu\.be%2F|%2Fv%2F)([^#&?\n]*)",
    )
    .expect("video id regex")
});

/// Hosts the metadata lookup knows how to describe
pub fn is_supported_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && SUPPORTED_URL_RE.is_match(url)
}

/// The video identifier embedded in a watch/short/embed URL
pub fn extract_video_id(url: &str) -> Option<&str> {
    VIDEO_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str())
        .filter(|id| !id.is_empty())
}

/// Job submissions accept any non-blank `http://` or `https://` URL
pub fn is_fetchable_url(url: &str) -> bool {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.chars().any(char::is_whitespace))
}
