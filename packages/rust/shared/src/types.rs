//! Core domain types shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one crawl job (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new time-sortable job identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FetchOutcome
// ---------------------------------------------------------------------------

/// A successfully fetched and converted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// The page URL as listed in the sitemap.
    pub url: String,
    /// Trimmed `<title>` text, or the URL when the page has none.
    pub title: String,
    /// Markdown body of the page's main content region.
    pub body: String,
}

/// A page that could not be fetched or converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// The page URL as listed in the sitemap.
    pub url: String,
    /// Human-readable reason.
    pub error: String,
}

/// Result of attempting one page. Exactly one is produced per URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(PageContent),
    Failure(PageFailure),
}

impl FetchOutcome {
    /// Build a failure outcome.
    pub fn failure(url: impl Into<String>, error: impl ToString) -> Self {
        Self::Failure(PageFailure {
            url: url.into(),
            error: error.to_string(),
        })
    }

    /// The URL this outcome belongs to.
    pub fn url(&self) -> &str {
        match self {
            Self::Success(page) => &page.url,
            Self::Failure(failure) => &failure.url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Events streamed to the client of a job, in order.
///
/// Serialized as `{"type": "log", "message": "..."}` and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Informational line.
    Log { message: String },
    /// Per-URL failure, or the terminating job error.
    Error { message: String },
    /// Coarse status such as `fetching: 7/40`.
    Progress { message: String },
    /// The job finished and the document can be downloaded.
    Complete {
        download_url: String,
        message: String,
    },
}

impl JobEvent {
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    /// The human-readable message carried by every variant.
    pub fn message(&self) -> &str {
        match self {
            Self::Log { message }
            | Self::Error { message }
            | Self::Progress { message }
            | Self::Complete { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_display_is_uuid() {
        let id = JobId::new();
        assert_eq!(id.to_string().len(), 36);
        assert_ne!(id, JobId::new());
    }

    #[test]
    fn outcome_accessors() {
        let ok = FetchOutcome::Success(PageContent {
            url: "https://example.com/a".into(),
            title: "A".into(),
            body: "text".into(),
        });
        assert!(ok.is_success());
        assert_eq!(ok.url(), "https://example.com/a");

        let failed = FetchOutcome::failure("https://example.com/b", "HTTP 404 Not Found");
        assert!(!failed.is_success());
        assert_eq!(failed.url(), "https://example.com/b");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(JobEvent::progress("fetching: 7/40")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "progress", "message": "fetching: 7/40"})
        );

        let json = serde_json::to_value(JobEvent::Complete {
            download_url: "/download/example_com_full_20240101_000000.md".into(),
            message: "complete".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(
            json["download_url"],
            "/download/example_com_full_20240101_000000.md"
        );
    }

    #[test]
    fn events_deserialize() {
        let event: JobEvent =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert_eq!(event, JobEvent::error("boom"));
        assert_eq!(event.message(), "boom");
    }
}
