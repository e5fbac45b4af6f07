//! `vdm info` – show what the built-in resolver knows about a URL.

use anyhow::Result;
use vdm_core::site::{BuiltinSites, SiteId, SiteResolver};

pub async fn run_info(url: &str) -> Result<()> {
    let sites = BuiltinSites::new();
    let site = sites.detect_site(url);
    println!("site:      {}", site.display_name());
    println!("id:        {}", sites.extract_id(url).as_deref().unwrap_or("-"));
    println!("canonical: {}", sites.clean_url(url));
    if site == SiteId::Unknown {
        return Ok(());
    }
    let meta = sites.get_metadata(url).await?;
    println!("title:     {}", meta.title.as_deref().unwrap_or("-"));
    match meta.thumbnail {
        Some(bytes) => println!("thumbnail: {} bytes", bytes.len()),
        None => println!("thumbnail: -"),
    }
    Ok(())
}
