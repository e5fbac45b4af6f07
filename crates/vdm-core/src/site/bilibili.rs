//! Bilibili URL rules (BV ids) and the public view API.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn bv_exact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^BV[a-zA-Z0-9]{10}$").expect("valid regex"))
}

fn bv_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"BV[a-zA-Z0-9]{10}").expect("valid regex"))
}

pub fn is_bv_id(s: &str) -> bool {
    bv_exact_re().is_match(s)
}

pub fn is_bilibili_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "bilibili.com" || host.ends_with(".bilibili.com") || host == "b23.tv"
}

/// BV id from a URL path or a bare id.
pub fn extract_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_bv_id(input) {
        return Some(input.to_string());
    }
    let url = Url::parse(input).ok()?;
    if !url.host_str().is_some_and(is_bilibili_host) {
        return None;
    }
    bv_re().find(url.path()).map(|m| m.as_str().to_string())
}

pub fn canonical_url(bv: &str) -> String {
    format!("https://www.bilibili.com/video/{}", bv)
}

pub fn view_api_url(bv: &str) -> String {
    format!("https://api.bilibili.com/x/web-interface/view?bvid={}", bv)
}

/// (title, cover image URL) from a view API response.
pub fn parse_view(body: &[u8]) -> Option<(Option<String>, Option<String>)> {
    let v: serde_json::Value = serde_json::from_slice(body).ok()?;
    if v.get("code").and_then(|c| c.as_i64()).unwrap_or(0) != 0 {
        return None;
    }
    let data = v.get("data")?;
    let text = |k: &str| {
        data.get(k)
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
    };
    let pic = text("pic").map(|p| match p.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => p,
    });
    Some((text("title"), pic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bv_from_urls() {
        let id = Some("BV1GJ411x7h7".to_string());
        assert_eq!(extract_id("BV1GJ411x7h7"), id);
        assert_eq!(extract_id("https://www.bilibili.com/video/BV1GJ411x7h7"), id);
        assert_eq!(
            extract_id("https://m.bilibili.com/video/BV1GJ411x7h7/?spm_id_from=333"),
            id
        );
        assert_eq!(extract_id("https://example.com/video/BV1GJ411x7h7"), None);
        assert_eq!(extract_id("BV123"), None);
    }

    #[test]
    fn view_response() {
        let body = br#"{"code":0,"data":{"title":"Some Title","pic":"http://i0.hdslb.com/bfs/archive/x.jpg"}}"#;
        let (title, pic) = parse_view(body).unwrap();
        assert_eq!(title.as_deref(), Some("Some Title"));
        assert_eq!(pic.as_deref(), Some("https://i0.hdslb.com/bfs/archive/x.jpg"));
        assert!(parse_view(br#"{"code":-404,"message":"not found"}"#).is_none());
    }

    #[test]
    fn urls() {
        assert_eq!(
            canonical_url("BV1GJ411x7h7"),
            "https://www.bilibili.com/video/BV1GJ411x7h7"
        );
        assert!(view_api_url("BV1GJ411x7h7").ends_with("bvid=BV1GJ411x7h7"));
    }
}
