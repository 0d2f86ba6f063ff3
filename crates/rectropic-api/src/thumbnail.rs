use std::sync::LazyLock;

use regex::Regex;

use rectropic_types::models::ContentType;

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\n?#]+)").expect("valid regex")
});

const TIKTOK_PLACEHOLDER: &str = "https://via.placeholder.com/300x400/FF0050/FFFFFF?text=TikTok";

/// Thumbnail to store for a new content. An explicit one always wins; URL
/// contents fall back to what can be derived from the link itself.
pub fn resolve(kind: ContentType, url: &str, supplied: Option<String>) -> Option<String> {
    if supplied.is_some() {
        return supplied;
    }
    match kind {
        ContentType::Url => derive_from_url(url),
        ContentType::Image | ContentType::Video => None,
    }
}

pub fn derive_from_url(url: &str) -> Option<String> {
    if let Some(caps) = YOUTUBE_ID.captures(url) {
        return Some(format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", &caps[1]));
    }
    if url.contains("tiktok.com") {
        return Some(TIKTOK_PLACEHOLDER.to_string());
    }
    None
}
