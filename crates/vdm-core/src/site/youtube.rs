//! YouTube URL rules: id extraction, canonical URL, thumbnail and oEmbed endpoints.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"))
}

fn loose_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|shorts|live)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#)
            .expect("valid regex")
    })
}

pub fn is_video_id(s: &str) -> bool {
    id_re().is_match(s)
}

pub fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com")
}

fn id_from_parsed(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    if host == "youtu.be" {
        return segments.next().map(String::from);
    }
    match segments.next()? {
        "watch" => url
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        "v" | "embed" | "e" | "shorts" | "live" => segments.next().map(String::from),
        _ => None,
    }
}

/// Video id from a URL or a bare 11-character id.
pub fn extract_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }
    if let Some(id) = Url::parse(input)
        .ok()
        .filter(|u| u.host_str().is_some_and(is_youtube_host))
        .and_then(|u| id_from_parsed(&u))
        .filter(|id| is_video_id(id))
    {
        return Some(id);
    }
    loose_re()
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| is_video_id(id))
}

pub fn canonical_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Thumbnail image URL; `quality` is one of default, mq, hq, maxres.
pub fn thumbnail_url(id: &str, quality: &str) -> String {
    let file = match quality {
        "default" => "default.jpg",
        "hq" => "hqdefault.jpg",
        "maxres" => "maxresdefault.jpg",
        _ => "mqdefault.jpg",
    };
    format!("https://img.youtube.com/vi/{}/{}", id, file)
}

pub fn oembed_url(id: &str) -> String {
    let canonical = canonical_url(id);
    match Url::parse_with_params(
        "https://www.youtube.com/oembed",
        &[("url", canonical.as_str()), ("format", "json")],
    ) {
        Ok(u) => u.to_string(),
        Err(_) => format!("https://www.youtube.com/oembed?format=json&url={}", canonical),
    }
}

/// Title from an oEmbed JSON response.
pub fn parse_oembed_title(body: &[u8]) -> Option<String> {
    let v: serde_json::Value = serde_json::from_slice(body).ok()?;
    v.get("title")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}
