use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub mod youtube;

/// Length of a YouTube video identifier
pub const VIDEO_ID_LEN: usize = 11;

const THUMBNAIL_BASE: &str = "https://img.youtube.com/vi";

/// An 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Accept a candidate token only if it has the exact identifier shape
    pub fn parse(candidate: &str) -> Option<Self> {
        let valid = candidate.len() == VIDEO_ID_LEN
            && candidate
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        valid.then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convention-based thumbnail URLs for this video
    pub fn thumbnails(&self) -> Thumbnails {
        Thumbnails {
            primary: format!("{}/{}/maxresdefault.jpg", THUMBNAIL_BASE, self.0),
            fallback: format!("{}/{}/mqdefault.jpg", THUMBNAIL_BASE, self.0),
        }
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VideoId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid video id: {}", value))
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

/// Thumbnail image locations; `fallback` is a lower resolution image that always exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnails {
    pub primary: String,
    pub fallback: String,
}

/// Extract the video identifier from user input.
///
/// Accepts short links, watch pages and embed URLs, with or without a scheme,
/// and also a link pasted inside surrounding text. Absence is a normal outcome.
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    input
        .split_whitespace()
        .map(strip_punctuation)
        .filter_map(parse_lenient)
        .find_map(|url| youtube::video_id_from_url(&url))
}

/// Check if any URL in the input points at YouTube, whether or not it names a video
pub fn looks_like_youtube(input: &str) -> bool {
    input
        .split_whitespace()
        .map(strip_punctuation)
        .filter_map(parse_lenient)
        .any(|url| youtube::is_youtube_url(&url))
}

/// Drop punctuation wrapping a link in prose, e.g. `(https://youtu.be/...).`
fn strip_punctuation(token: &str) -> &str {
    token
        .trim_start_matches(|c: char| !c.is_alphanumeric() && c != '/')
        .trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
}

/// Parse a URL, assuming `https` when the scheme is missing
pub fn parse_lenient(candidate: &str) -> Option<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    let parsed = if candidate.contains("://") {
        Url::parse(candidate)
    } else if let Some(rest) = candidate.strip_prefix("//") {
        Url::parse(&format!("https://{}", rest))
    } else {
        Url::parse(&format!("https://{}", candidate))
    };

    parsed
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_shape() {
        assert!(VideoId::parse("dQw4w9WgXcQ").is_some());
        assert!(VideoId::parse("a-b_c-d_e-f").is_some());
        assert!(VideoId::parse("dQw4w9WgXc").is_none());
        assert!(VideoId::parse("dQw4w9WgXcQQ").is_none());
        assert!(VideoId::parse("dQw4w9WgXc!").is_none());
        assert!(VideoId::parse("").is_none());
    }

    #[test]
    fn test_thumbnails_substitute_identifier() {
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let thumbs = id.thumbnails();
        assert_eq!(
            thumbs.primary,
            "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
        assert_eq!(
            thumbs.fallback,
            "https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg"
        );
    }

    #[test]
    fn test_parse_lenient() {
        assert!(parse_lenient("youtu.be/dQw4w9WgXcQ").is_some());
        assert!(parse_lenient("//youtu.be/dQw4w9WgXcQ").is_some());
        assert!(parse_lenient("ftp://youtu.be/dQw4w9WgXcQ").is_none());
        assert!(parse_lenient("   ").is_none());
    }

    #[test]
    fn test_extract_from_surrounding_text() {
        let id = extract_video_id("listen to this https://youtu.be/dQw4w9WgXcQ !!");
        assert_eq!(id.unwrap().as_str(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_ignores_wrapping_punctuation() {
        for input in [
            "listen: https://youtu.be/dQw4w9WgXcQ.",
            "(https://www.youtube.com/watch?v=dQw4w9WgXcQ)",
            "\"https://www.youtube.com/embed/dQw4w9WgXcQ\",",
            "see <youtu.be/dQw4w9WgXcQ>!",
        ] {
            let id = extract_video_id(input);
            assert_eq!(
                id.map(String::from).as_deref(),
                Some("dQw4w9WgXcQ"),
                "input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_looks_like_youtube() {
        assert!(looks_like_youtube("https://www.youtube.com/feed/trending"));
        assert!(!looks_like_youtube("https://example.com/watch?v=dQw4w9WgXcQ"));
    }

    #[test]
    fn test_video_id_serde() {
        let id: VideoId = serde_json::from_str("\"dQw4w9WgXcQ\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dQw4w9WgXcQ\"");
        assert!(serde_json::from_str::<VideoId>("\"short\"").is_err());
    }
}
