//! Error types for sitemark.
//!
//! Library crates use [`SitemarkError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sitemark operations.
#[derive(Debug, thiserror::Error)]
pub enum SitemarkError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The sitemap could not be fetched or is not well-formed XML.
    #[error("failed to resolve sitemap {url}: {message}")]
    SitemapFetch { url: String, message: String },

    /// The sitemap parsed cleanly but listed no page URLs.
    #[error("no URLs found in sitemap {url}{}", nested_note(*nested_sitemaps))]
    NoUrlsFound { url: String, nested_sitemaps: usize },

    /// Network/HTTP error while fetching a page.
    #[error("network error: {0}")]
    Network(String),

    /// XML or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// The job could not run at all (HTTP client, output directory, ...).
    #[error("job infrastructure error: {0}")]
    Infrastructure(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The job was cancelled before it finished.
    #[error("job cancelled")]
    Cancelled,
}

fn nested_note(nested_sitemaps: usize) -> String {
    if nested_sitemaps == 0 {
        String::new()
    } else {
        format!(" (sitemap index with {nested_sitemaps} nested sitemaps; indexes are not expanded)")
    }
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitemarkError>;

impl SitemarkError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a sitemap fetch error for `url`.
    pub fn sitemap_fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SitemapFetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a job infrastructure error.
    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::Infrastructure(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SitemarkError::config("bad port");
        assert_eq!(err.to_string(), "config error: bad port");

        let err = SitemarkError::sitemap_fetch("https://example.com/sitemap.xml", "HTTP 500");
        assert_eq!(
            err.to_string(),
            "failed to resolve sitemap https://example.com/sitemap.xml: HTTP 500"
        );
    }

    #[test]
    fn no_urls_found_mentions_sitemap_index() {
        let plain = SitemarkError::NoUrlsFound {
            url: "https://example.com/sitemap.xml".into(),
            nested_sitemaps: 0,
        };
        assert_eq!(
            plain.to_string(),
            "no URLs found in sitemap https://example.com/sitemap.xml"
        );

        let index = SitemarkError::NoUrlsFound {
            url: "https://example.com/sitemap.xml".into(),
            nested_sitemaps: 3,
        };
        assert!(index.to_string().contains("3 nested sitemaps"));
    }
}
