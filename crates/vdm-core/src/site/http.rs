//! Small blocking GET helper on libcurl, run on the blocking pool from async code.

use anyhow::{Context, Result};
use std::time::Duration;

/// Metadata responses and thumbnails are small; anything bigger is refused.
const MAX_BODY: usize = 8 * 1024 * 1024;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// GET `url` and return the body. Non-2xx statuses are errors.
///
/// Runs in the current thread; use [`fetch`] from async code.
pub fn fetch_blocking(url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.get(true)?;
    easy.follow_location(true)?;
    easy.max_redirections(5)?;
    easy.connect_timeout(Duration::from_secs(10))?;
    easy.timeout(Duration::from_secs(15))?;
    easy.useragent(USER_AGENT)?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if body.len() + data.len() > MAX_BODY {
                // Returning a short count makes curl abort the transfer.
                return Ok(0);
            }
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer
            .perform()
            .with_context(|| format!("GET {} failed", url))?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("GET {} returned HTTP {}", url, code);
    }
    Ok(body)
}

/// Async wrapper around [`fetch_blocking`].
pub async fn fetch(url: String, headers: Vec<(&'static str, String)>) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let pairs: Vec<(&str, &str)> = headers.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fetch_blocking(&url, &pairs)
    })
    .await
    .context("fetch task panicked")?
}
