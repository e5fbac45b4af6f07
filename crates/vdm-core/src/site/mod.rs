//! Site capability interface: detect the site of a URL, normalize it into a
//! job key, and fetch display metadata.

pub mod bilibili;
mod builtin;
pub mod http;
pub mod youtube;

pub use builtin::BuiltinSites;

use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteId {
    Youtube,
    Bilibili,
    Unknown,
}

impl SiteId {
    pub fn as_str(self) -> &'static str {
        match self {
            SiteId::Youtube => "youtube",
            SiteId::Bilibili => "bilibili",
            SiteId::Unknown => "unknown",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SiteId::Youtube => "YouTube",
            SiteId::Bilibili => "Bilibili",
            SiteId::Unknown => "Unknown site",
        }
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort display metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    /// Raw image bytes.
    pub thumbnail: Option<Vec<u8>>,
}

#[async_trait]
pub trait SiteResolver: Send + Sync {
    fn detect_site(&self, url: &str) -> SiteId;

    /// Canonical URL used as the job key. Unknown sites return the input trimmed.
    fn clean_url(&self, url: &str) -> String;

    fn extract_id(&self, url: &str) -> Option<String>;

    async fn get_metadata(&self, url: &str) -> anyhow::Result<VideoMetadata>;
}

/// Mode requested through a `youtubemaster://video/<url>` or `.../audio/<url>` link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Video,
    Audio,
}

pub const PROTOCOL_PREFIX: &str = "youtubemaster://";

/// Strips the protocol-handler prefix, returning the inner URL and requested mode.
pub fn strip_protocol(input: &str) -> (&str, Option<LinkMode>) {
    let input = input.trim();
    let Some(rest) = input.strip_prefix(PROTOCOL_PREFIX) else {
        return (input, None);
    };
    if let Some(inner) = rest.strip_prefix("video/") {
        (inner, Some(LinkMode::Video))
    } else if let Some(inner) = rest.strip_prefix("audio/") {
        (inner, Some(LinkMode::Audio))
    } else {
        (rest, None)
    }
}
