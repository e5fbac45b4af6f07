use anyhow::{anyhow, Result};
use async_trait::async_trait;
use url::Url;

use super::http::fetch;
use super::{bilibili, strip_protocol, youtube, SiteId, SiteResolver, VideoMetadata};

/// YouTube and Bilibili, fetched over HTTP with libcurl.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSites;

impl BuiltinSites {
    pub fn new() -> Self {
        Self
    }

    pub fn supported() -> &'static [SiteId] {
        &[SiteId::Youtube, SiteId::Bilibili]
    }

    async fn youtube_metadata(id: &str) -> Result<VideoMetadata> {
        let title = match fetch(youtube::oembed_url(id), Vec::new()).await {
            Ok(body) => youtube::parse_oembed_title(&body),
            Err(e) => {
                tracing::debug!("oembed lookup for {} failed: {:#}", id, e);
                None
            }
        };
        let thumbnail = match fetch(youtube::thumbnail_url(id, "mq"), Vec::new()).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("thumbnail fetch for {} failed: {:#}", id, e);
                None
            }
        };
        if title.is_none() && thumbnail.is_none() {
            return Err(anyhow!("no metadata for YouTube video {}", id));
        }
        Ok(VideoMetadata { title, thumbnail })
    }

    async fn bilibili_metadata(bv: &str) -> Result<VideoMetadata> {
        let referer = ("Referer", "https://www.bilibili.com/".to_string());
        let body = fetch(bilibili::view_api_url(bv), vec![referer.clone()]).await?;
        let (title, pic) =
            bilibili::parse_view(&body).ok_or_else(|| anyhow!("bad view response for {}", bv))?;
        let thumbnail = match pic {
            Some(pic) => match fetch(pic, vec![referer]).await {
                Ok(bytes) if !bytes.is_empty() => Some(bytes),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("cover fetch for {} failed: {:#}", bv, e);
                    None
                }
            },
            None => None,
        };
        Ok(VideoMetadata { title, thumbnail })
    }
}

#[async_trait]
impl SiteResolver for BuiltinSites {
    fn detect_site(&self, url: &str) -> SiteId {
        let (url, _) = strip_protocol(url);
        if url.is_empty() {
            return SiteId::Unknown;
        }
        match Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(h) if youtube::is_youtube_host(h) => SiteId::Youtube,
                Some(h) if bilibili::is_bilibili_host(h) => SiteId::Bilibili,
                _ => SiteId::Unknown,
            },
            Err(_) if youtube::is_video_id(url) => SiteId::Youtube,
            Err(_) if bilibili::is_bv_id(url) => SiteId::Bilibili,
            Err(_) => SiteId::Unknown,
        }
    }

    fn clean_url(&self, url: &str) -> String {
        let (inner, _) = strip_protocol(url);
        let canonical = match self.detect_site(inner) {
            SiteId::Youtube => youtube::extract_id(inner).map(|id| youtube::canonical_url(&id)),
            SiteId::Bilibili => bilibili::extract_id(inner).map(|bv| bilibili::canonical_url(&bv)),
            SiteId::Unknown => None,
        };
        canonical.unwrap_or_else(|| inner.to_string())
    }

    fn extract_id(&self, url: &str) -> Option<String> {
        let (inner, _) = strip_protocol(url);
        match self.detect_site(inner) {
            SiteId::Youtube => youtube::extract_id(inner),
            SiteId::Bilibili => bilibili::extract_id(inner),
            SiteId::Unknown => None,
        }
    }

    async fn get_metadata(&self, url: &str) -> Result<VideoMetadata> {
        let site = self.detect_site(url);
        let id = self
            .extract_id(url)
            .ok_or_else(|| anyhow!("no video id in {}", url))?;
        match site {
            SiteId::Youtube => Self::youtube_metadata(&id).await,
            SiteId::Bilibili => Self::bilibili_metadata(&id).await,
            SiteId::Unknown => Err(anyhow!("unsupported site: {}", url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sites() {
        let s = BuiltinSites::new();
        assert_eq!(s.detect_site("https://youtu.be/dQw4w9WgXcQ"), SiteId::Youtube);
        assert_eq!(s.detect_site("dQw4w9WgXcQ"), SiteId::Youtube);
        assert_eq!(s.detect_site("BV1GJ411x7h7"), SiteId::Bilibili);
        assert_eq!(
            s.detect_site("https://www.bilibili.com/video/BV1GJ411x7h7"),
            SiteId::Bilibili
        );
        assert_eq!(s.detect_site("https://vimeo.com/123"), SiteId::Unknown);
        assert_eq!(s.detect_site(""), SiteId::Unknown);
    }

    #[test]
    fn different_urls_normalize_to_one_key() {
        let s = BuiltinSites::new();
        let a = s.clean_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10s");
        let b = s.clean_url("https://youtu.be/dQw4w9WgXcQ?si=xyz");
        let c = s.clean_url("youtubemaster://video/https://m.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(a, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(
            s.clean_url("https://www.bilibili.com/video/BV1GJ411x7h7/?p=1"),
            "https://www.bilibili.com/video/BV1GJ411x7h7"
        );
        assert_eq!(s.clean_url(" https://vimeo.com/123 "), "https://vimeo.com/123");
    }

    #[test]
    fn ids() {
        let s = BuiltinSites::new();
        assert_eq!(s.extract_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(s.extract_id("https://vimeo.com/123"), None);
    }

    #[tokio::test]
    async fn unknown_site_metadata_is_an_error() {
        let s = BuiltinSites::new();
        assert!(s.get_metadata("https://vimeo.com/123").await.is_err());
    }
}
