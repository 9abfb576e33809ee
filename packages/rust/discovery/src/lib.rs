//! Sitemap resolution.
//!
//! Fetches a sitemap document and extracts the distinct page URLs it lists.
//! Sitemap indexes are detected but never expanded; a sitemap that yields no
//! page URLs is reported as [`SitemarkError::NoUrlsFound`].

mod parser;

use std::time::Duration;

use reqwest::Client;
use reqwest::header::USER_AGENT;
use tracing::{info, instrument, warn};

use sitemark_shared::{Result, SITEMAP_USER_AGENT, SitemarkError};

pub use parser::{ParsedSitemap, SITEMAP_NS};

/// Default timeout in seconds for fetching a sitemap.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum sitemap size we accept (the sitemaps.org limit, 50 MiB).
pub const MAX_SITEMAP_SIZE: u64 = 50 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for resolving one sitemap.
#[derive(Debug, Clone)]
pub struct SitemapOptions {
    /// Timeout for the sitemap request.
    pub timeout: Duration,
    /// User-Agent header sent with the sitemap request.
    pub user_agent: String,
    /// Largest sitemap body accepted, in bytes.
    pub max_bytes: u64,
}

impl Default for SitemapOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: SITEMAP_USER_AGENT.to_string(),
            max_bytes: MAX_SITEMAP_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Fetch `sitemap_url` with `client` and return the page URLs it lists.
///
/// Returns [`SitemarkError::SitemapFetch`] when the request fails, the status
/// is not 2xx, or the body is not well-formed XML, and
/// [`SitemarkError::NoUrlsFound`] when the document lists no pages.
#[instrument(skip_all, fields(url = %sitemap_url))]
pub async fn resolve(
    client: &Client,
    sitemap_url: &str,
    opts: &SitemapOptions,
) -> Result<ParsedSitemap> {
    info!("fetching sitemap");

    let body = fetch_sitemap(client, sitemap_url, opts).await?;
    let parsed = parser::parse_sitemap(&body)
        .map_err(|e| SitemarkError::sitemap_fetch(sitemap_url, e.to_string()))?;

    if parsed.urls.is_empty() {
        if !parsed.nested_sitemaps.is_empty() {
            warn!(
                nested = parsed.nested_sitemaps.len(),
                "sitemap index found; nested sitemaps are not expanded"
            );
        }
        return Err(SitemarkError::NoUrlsFound {
            url: sitemap_url.to_string(),
            nested_sitemaps: parsed.nested_sitemaps.len(),
        });
    }

    info!(urls = parsed.urls.len(), "sitemap resolved");
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch the sitemap body, mapping every failure to a sitemap fetch error.
async fn fetch_sitemap(client: &Client, url: &str, opts: &SitemapOptions) -> Result<String> {
    let mut response = client
        .get(url)
        .header(USER_AGENT, &opts.user_agent)
        .timeout(opts.timeout)
        .send()
        .await
        .map_err(|e| SitemarkError::sitemap_fetch(url, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SitemarkError::sitemap_fetch(url, format!("HTTP {status}")));
    }

    let too_large = |len: u64| {
        SitemarkError::sitemap_fetch(
            url,
            format!("sitemap too large ({len} bytes, max {})", opts.max_bytes),
        )
    };

    if let Some(len) = response.content_length() {
        if len > opts.max_bytes {
            return Err(too_large(len));
        }
    }

    // Chunked responses carry no length up front; count as we read.
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| SitemarkError::sitemap_fetch(url, format!("failed to read body: {e}")))?
    {
        let len = (body.len() + chunk.len()) as u64;
        if len > opts.max_bytes {
            return Err(too_large(len));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}
