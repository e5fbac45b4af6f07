//! Best-effort title and thumbnail lookup, started at submission and not
//! counted against the download slots.

use std::sync::Arc;

use crate::job::{Thumbnail, TitleQuality};
use crate::retry::{run_with_retry, ErrorKind, RetryError, RetryPolicy};
use crate::site::{SiteId, SiteResolver};

/// Title used when the site lookup gave nothing.
pub fn placeholder_title(site: SiteId, id: Option<&str>) -> String {
    match (site, id) {
        (SiteId::Unknown, _) | (_, None) => "Unknown video".to_string(),
        (site, Some(id)) => format!("{} video: {}", site.display_name(), id),
    }
}

/// What a prefetch produced. Always has a title; `quality` says how good it is.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMetadata {
    pub title: String,
    pub quality: TitleQuality,
    pub thumbnail: Option<Thumbnail>,
}

pub struct MetadataPrefetcher {
    sites: Arc<dyn SiteResolver>,
    policy: RetryPolicy,
}

impl MetadataPrefetcher {
    pub fn new(sites: Arc<dyn SiteResolver>, policy: RetryPolicy) -> Self {
        Self { sites, policy }
    }

    /// Looks up metadata for `url`, retrying every failure up to the policy
    /// bound, then falls back to a placeholder built from site and id.
    pub async fn resolve(&self, url: &str) -> ResolvedMetadata {
        let site = self.sites.detect_site(url);
        let id = self.sites.extract_id(url);
        tracing::debug!(url, %site, id = ?id, "prefetching metadata");

        // Every lookup failure is worth another try here; nothing is terminal.
        let result = run_with_retry(
            &self.policy,
            None,
            |_: &anyhow::Error| ErrorKind::Connection,
            |next, e: &anyhow::Error, _| {
                tracing::debug!(url, "metadata lookup failed, attempt {}: {:#}", next, e);
            },
            || self.sites.get_metadata(url),
        )
        .await;

        let (title, thumbnail) = match result {
            Ok(meta) => (
                meta.title.filter(|t| !t.trim().is_empty()),
                meta.thumbnail.filter(|b| !b.is_empty()).map(Thumbnail::from),
            ),
            Err(RetryError::GaveUp { error, attempts }) => {
                tracing::info!(url, attempts, "metadata unavailable: {:#}", error);
                (None, None)
            }
            Err(RetryError::Cancelled) => (None, None),
        };

        match title {
            Some(title) => ResolvedMetadata {
                title,
                quality: TitleQuality::Real,
                thumbnail,
            },
            None => ResolvedMetadata {
                title: placeholder_title(site, id.as_deref()),
                quality: TitleQuality::Placeholder,
                thumbnail,
            },
        }
    }
}
