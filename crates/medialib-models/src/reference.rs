//! Remote reference extraction.
//!
//! Uploads for remote providers arrive either as a bare video id or as a
//! page URL. These helpers normalize both forms to the provider id.

use thiserror::Error;
use url::Url;

/// Errors that can occur during reference extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// URL belongs to another platform
    #[error("URL does not belong to {0}")]
    WrongPlatform(&'static str),
    /// Video ID has invalid format
    #[error("Video ID has invalid format")]
    InvalidVideoId,
    /// Video ID not found in URL
    #[error("Video ID not found in URL")]
    VideoIdNotFound,
}

/// Result type for reference extraction.
pub type ReferenceResult<T> = Result<T, ReferenceError>;

fn looks_like_url(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.contains('/')
}

fn parse_url(input: &str) -> Option<Url> {
    let candidate = if input.to_ascii_lowercase().starts_with("http") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    Url::parse(&candidate).ok()
}

fn host_matches(url: &Url, domains: &[&str]) -> bool {
    url.host_str()
        .map(|host| {
            let host = host.to_ascii_lowercase();
            domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
        })
        .unwrap_or(false)
}

/// Extract the first path segment following `marker`.
fn segment_after<'a>(url: &'a Url, marker: &str) -> Option<&'a str> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == marker)?;
    segments.next().filter(|s| !s.is_empty())
}

fn first_segment(url: &Url) -> Option<&str> {
    url.path_segments()?.find(|s| !s.is_empty())
}

// ============================================================================
// YouTube
// ============================================================================

/// Check if string contains only valid YouTube ID characters
fn is_valid_youtube_id(id: &str) -> bool {
    id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a YouTube video id from an id or URL.
///
/// Supports:
/// - BDYAbAtaDzA
/// - https://youtube.com/watch?v=VIDEO_ID
/// - https://youtu.be/VIDEO_ID
/// - https://youtube.com/embed/VIDEO_ID
/// - https://youtube.com/v/VIDEO_ID
/// - https://youtube.com/shorts/VIDEO_ID
pub fn extract_youtube_id(input: &str) -> ReferenceResult<String> {
    let input = input.trim();

    if !looks_like_url(input) {
        return if is_valid_youtube_id(input) {
            Ok(input.to_string())
        } else {
            Err(ReferenceError::InvalidVideoId)
        };
    }

    let url = parse_url(input).ok_or(ReferenceError::VideoIdNotFound)?;

    let candidate = if host_matches(&url, &["youtu.be"]) {
        first_segment(&url).map(str::to_string)
    } else if host_matches(&url, &["youtube.com"]) {
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .or_else(|| {
                ["embed", "v", "shorts"]
                    .iter()
                    .find_map(|marker| segment_after(&url, marker))
                    .map(str::to_string)
            })
    } else {
        return Err(ReferenceError::WrongPlatform("YouTube"));
    };

    match candidate {
        Some(id) if is_valid_youtube_id(&id) => Ok(id),
        Some(_) => Err(ReferenceError::InvalidVideoId),
        None => Err(ReferenceError::VideoIdNotFound),
    }
}

// ============================================================================
// Vimeo
// ============================================================================

/// Extract a numeric Vimeo video id from an id or URL.
///
/// Supports `https://vimeo.com/ID`, `https://vimeo.com/channels/x/ID` and
/// `https://player.vimeo.com/video/ID`.
pub fn extract_vimeo_id(input: &str) -> ReferenceResult<String> {
    let input = input.trim();
    let is_numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    if !looks_like_url(input) {
        return if is_numeric(input) {
            Ok(input.to_string())
        } else {
            Err(ReferenceError::InvalidVideoId)
        };
    }

    let url = parse_url(input).ok_or(ReferenceError::VideoIdNotFound)?;
    if !host_matches(&url, &["vimeo.com"]) {
        return Err(ReferenceError::WrongPlatform("Vimeo"));
    }

    url.path_segments()
        .and_then(|segments| segments.filter(|s| is_numeric(s)).last())
        .map(str::to_string)
        .ok_or(ReferenceError::VideoIdNotFound)
}

// ============================================================================
// Dailymotion
// ============================================================================

/// Extract a Dailymotion video id from an id or URL.
///
/// Page URLs carry a slug after the id (`/video/x7tgad0_some-title`),
/// which is stripped.
pub fn extract_dailymotion_id(input: &str) -> ReferenceResult<String> {
    let input = input.trim();
    let is_valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());

    if !looks_like_url(input) {
        return if is_valid(input) {
            Ok(input.to_string())
        } else {
            Err(ReferenceError::InvalidVideoId)
        };
    }

    let url = parse_url(input).ok_or(ReferenceError::VideoIdNotFound)?;
    let candidate = if host_matches(&url, &["dai.ly"]) {
        first_segment(&url)
    } else if host_matches(&url, &["dailymotion.com"]) {
        segment_after(&url, "video")
    } else {
        return Err(ReferenceError::WrongPlatform("Dailymotion"));
    };

    let id = candidate
        .map(|s| s.split('_').next().unwrap_or(s))
        .ok_or(ReferenceError::VideoIdNotFound)?;

    if is_valid(id) {
        Ok(id.to_string())
    } else {
        Err(ReferenceError::InvalidVideoId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_youtube_id_success_cases() {
        assert_eq!(extract_youtube_id("BDYAbAtaDzA").unwrap(), "BDYAbAtaDzA");
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_youtube_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_youtube_id("https://youtu.be/dQw4w9WgXcQ?t=30").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/embed/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_youtube_id("http://www.youtube.com/v/BDYAbAtaDzA?fs=1").unwrap(),
            "BDYAbAtaDzA"
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/shorts/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        // Extra whitespace is trimmed
        assert_eq!(
            extract_youtube_id("  https://YOUTUBE.COM/watch?v=dQw4w9WgXcQ  ").unwrap(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_extract_youtube_id_error_cases() {
        assert_eq!(
            extract_youtube_id("https://vimeo.com/123"),
            Err(ReferenceError::WrongPlatform("YouTube"))
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com"),
            Err(ReferenceError::VideoIdNotFound)
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?v=abc123"),
            Err(ReferenceError::InvalidVideoId)
        );
        assert_eq!(extract_youtube_id("abc"), Err(ReferenceError::InvalidVideoId));
    }

    #[test]
    fn test_extract_vimeo_id() {
        assert_eq!(extract_vimeo_id("21216091").unwrap(), "21216091");
        assert_eq!(extract_vimeo_id("https://vimeo.com/21216091").unwrap(), "21216091");
        assert_eq!(
            extract_vimeo_id("https://player.vimeo.com/video/21216091?h=abc").unwrap(),
            "21216091"
        );
        assert_eq!(
            extract_vimeo_id("https://vimeo.com/channels/staffpicks/21216091").unwrap(),
            "21216091"
        );
        assert_eq!(extract_vimeo_id("abc"), Err(ReferenceError::InvalidVideoId));
        assert_eq!(
            extract_vimeo_id("https://youtu.be/dQw4w9WgXcQ"),
            Err(ReferenceError::WrongPlatform("Vimeo"))
        );
    }

    #[test]
    fn test_extract_dailymotion_id() {
        assert_eq!(extract_dailymotion_id("x7tgad0").unwrap(), "x7tgad0");
        assert_eq!(
            extract_dailymotion_id("https://www.dailymotion.com/video/x7tgad0_some-title").unwrap(),
            "x7tgad0"
        );
        assert_eq!(extract_dailymotion_id("https://dai.ly/x7tgad0").unwrap(), "x7tgad0");
        assert_eq!(
            extract_dailymotion_id("https://www.dailymotion.com/user/someone"),
            Err(ReferenceError::VideoIdNotFound)
        );
    }

    #[test]
    fn test_reference_error_display() {
        assert_eq!(
            ReferenceError::WrongPlatform("YouTube").to_string(),
            "URL does not belong to YouTube"
        );
        assert_eq!(
            ReferenceError::VideoIdNotFound.to_string(),
            "Video ID not found in URL"
        );
    }
}
