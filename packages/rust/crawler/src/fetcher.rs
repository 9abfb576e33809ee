//! HTTP page fetching.
//!
//! One [`reqwest::Client`] is built per job and shared by every fetch task.
//! Clones share its connection pool.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument, warn};

use sitemark_shared::{
    BROWSER_USER_AGENT, FetchOutcome, JobConfig, PageContent, Result, SitemarkError,
};

/// Redirects followed before a fetch is treated as failed.
const MAX_REDIRECTS: usize = 10;

// ---------------------------------------------------------------------------
// Client construction
// ---------------------------------------------------------------------------

/// HTTP settings shared by every page fetch in a job.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// User-Agent sent with page requests.
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_redirects: MAX_REDIRECTS,
        }
    }
}

impl From<&JobConfig> for HttpOptions {
    fn from(config: &JobConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout,
            max_redirects: MAX_REDIRECTS,
        }
    }
}

/// Build the shared HTTP client.
///
/// A failure here is a job-level infrastructure error, never a per-page one.
pub fn build_client(opts: &HttpOptions) -> Result<Client> {
    Client::builder()
        .user_agent(&opts.user_agent)
        .redirect(reqwest::redirect::Policy::limited(opts.max_redirects))
        .timeout(opts.timeout)
        .build()
        .map_err(|e| SitemarkError::infrastructure(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// PageExtractor
// ---------------------------------------------------------------------------

/// Turns one URL into exactly one [`FetchOutcome`].
///
/// Implementations must not panic on bad input; every failure is reported
/// as [`FetchOutcome::Failure`].
pub trait PageExtractor: Send + Sync + 'static {
    fn extract(&self, url: String) -> impl Future<Output = FetchOutcome> + Send;
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

/// Fetches pages over HTTP and converts their main content to Markdown.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch `url` and extract its content.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<PageContent> {
        debug!("fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SitemarkError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SitemarkError::Network(format!("HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SitemarkError::Network(format!("body read failed: {e}")))?;

        let page = sitemark_markdown::extract(&html, url)?;

        Ok(PageContent {
            url: url.to_string(),
            title: page.title,
            body: page.markdown,
        })
    }
}

impl PageExtractor for PageFetcher {
    fn extract(&self, url: String) -> impl Future<Output = FetchOutcome> + Send {
        async move {
            match self.fetch(&url).await {
                Ok(page) => FetchOutcome::Success(page),
                Err(e) => {
                    warn!(%url, error = %e, "page failed");
                    FetchOutcome::failure(url, e)
                }
            }
        }
    }
}
