//! End-to-end job: sitemap → fetch → extract → assemble → document on disk.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

use sitemark_crawler::{BatchSummary, HttpOptions, PageFetcher, Scheduler, build_client};
use sitemark_discovery::SitemapOptions;
use sitemark_shared::{
    FetchOutcome, JobConfig, JobEvent, PageContent, PageFailure, Result, SitemarkError,
};

use crate::assembler;
use crate::output::{self, WrittenDocument};

/// Characters of a page title echoed in per-page log events.
const TITLE_PREVIEW_CHARS: usize = 30;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Receives the ordered event stream of a job.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: JobEvent);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, _event: JobEvent) {}
}

/// Forwards events to an unbounded channel, e.g. a WebSocket writer.
///
/// Events sent after the receiver is gone are dropped.
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelReporter {
    pub fn new(tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Result of a finished job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub document: WrittenDocument,
    /// Retrieval path of the document, e.g. `/download/<filename>`.
    pub download_url: String,
    pub page_count: usize,
    pub failures: Vec<PageFailure>,
    pub summary: BatchSummary,
    pub elapsed: Duration,
}

/// Run one job and stream its events to `reporter`.
///
/// The stream always ends with exactly one terminal event: `complete` when a
/// document was written (possibly with zero pages), `error` otherwise.
#[instrument(skip_all, fields(sitemap = %sitemap_url))]
pub async fn run_job(
    config: &JobConfig,
    sitemap_url: &str,
    reporter: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> Result<JobReport> {
    match execute(config, sitemap_url, reporter, cancel).await {
        Ok(report) => {
            reporter.report(JobEvent::Complete {
                download_url: report.download_url.clone(),
                message: "complete".to_string(),
            });
            Ok(report)
        }
        Err(e) => {
            reporter.report(JobEvent::error(e.to_string()));
            Err(e)
        }
    }
}

async fn execute(
    config: &JobConfig,
    sitemap_url: &str,
    reporter: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> Result<JobReport> {
    let start = Instant::now();
    validate_sitemap_url(sitemap_url)?;

    // --- Phase 1: Sitemap ---
    reporter.report(JobEvent::log(format!("resolving sitemap: {sitemap_url}")));
    reporter.report(JobEvent::progress("fetching URL list"));

    let client = build_client(&HttpOptions::from(config))?;
    let sitemap_opts = SitemapOptions {
        timeout: config.request_timeout,
        user_agent: config.sitemap_user_agent.clone(),
        ..SitemapOptions::default()
    };

    let sitemap = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SitemarkError::Cancelled),
        resolved = sitemark_discovery::resolve(&client, sitemap_url, &sitemap_opts) => resolved?,
    };

    let total = sitemap.urls.len();
    reporter.report(JobEvent::log(format!("found {total} pages")));

    // --- Phase 2: Fetch ---
    let fetcher = Arc::new(PageFetcher::new(client));
    let scheduler = Scheduler::new(config.concurrency);
    let (tx, mut rx) = mpsc::channel(scheduler.budget() * 2);

    let collect = async {
        let mut pages: Vec<PageContent> = Vec::with_capacity(total);
        let mut failures: Vec<PageFailure> = Vec::new();
        let mut done = 0;

        while let Some(outcome) = rx.recv().await {
            done += 1;
            match outcome {
                FetchOutcome::Success(page) => {
                    reporter.report(JobEvent::log(format!(
                        "[{done}/{total}] ok: {}",
                        title_preview(&page.title)
                    )));
                    pages.push(page);
                }
                FetchOutcome::Failure(failure) => {
                    reporter.report(JobEvent::error(format!(
                        "[{done}/{total}] failed: {} ({})",
                        failure.url, failure.error
                    )));
                    failures.push(failure);
                }
            }
            reporter.report(JobEvent::progress(format!("fetching: {done}/{total}")));
        }

        (pages, failures)
    };

    let (summary, (pages, failures)) = tokio::join!(
        scheduler.run(fetcher, sitemap.urls, tx, cancel.clone()),
        collect
    );

    if summary.was_cancelled() || cancel.is_cancelled() {
        return Err(SitemarkError::Cancelled);
    }

    // --- Phase 3: Assemble ---
    reporter.report(JobEvent::progress("generating document"));

    let generated_at = Local::now();
    let document = assembler::assemble(pages, sitemap_url, &generated_at);
    let filename = output::document_filename(sitemap_url, &generated_at);
    let written = output::write_document(&config.output_dir, &filename, &document.text)?;

    let download_url = format!(
        "{}/{}",
        config.download_route.trim_end_matches('/'),
        written.filename
    );

    info!(
        pages = document.page_count(),
        failed = failures.len(),
        elapsed_ms = start.elapsed().as_millis(),
        file = %written.filename,
        "job completed"
    );

    Ok(JobReport {
        page_count: document.page_count(),
        document: written,
        download_url,
        failures,
        summary,
        elapsed: start.elapsed(),
    })
}

/// Only absolute http(s) sitemap URLs are accepted.
fn validate_sitemap_url(sitemap_url: &str) -> Result<()> {
    let url = Url::parse(sitemap_url).map_err(|e| {
        SitemarkError::validation(format!("invalid sitemap URL '{sitemap_url}': {e}"))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SitemarkError::validation(format!(
            "unsupported sitemap URL scheme '{other}'"
        ))),
    }
}

/// The first few characters of a title, with `...` when cut.
fn title_preview(title: &str) -> String {
    let mut chars = title.chars();
    let preview: String = chars.by_ref().take(TITLE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<JobEvent>>,
    }

    impl RecordingReporter {
        fn events(&self) -> Vec<JobEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: JobEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn test_config() -> (JobConfig, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sitemark-job-{}", uuid::Uuid::now_v7()));
        let config = JobConfig {
            output_dir: dir.clone(),
            concurrency: 2,
            request_timeout: Duration::from_secs(5),
            ..JobConfig::default()
        };
        (config, dir)
    }

    fn sitemap(base: &str, paths: &[&str]) -> String {
        let mut xml = String::from(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        for p in paths {
            xml.push_str(&format!("<url><loc>{base}{p}</loc></url>"));
        }
        xml.push_str("</urlset>");
        xml
    }

    fn html(title: &str, text: &str) -> String {
        format!("<html><head><title>{title}</title></head><body><nav>menu</nav><main><p>{text}</p></main></body></html>")
    }

    async fn mount_page(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[test]
    fn title_preview_truncates() {
        assert_eq!(title_preview("short"), "short");
        let long = "x".repeat(40);
        assert_eq!(title_preview(&long), format!("{}...", "x".repeat(30)));
    }

    #[tokio::test]
    async fn invalid_sitemap_url_is_rejected() {
        let (config, dir) = test_config();
        let reporter = RecordingReporter::default();

        for bad in ["not a url", "ftp://a.example/sitemap.xml"] {
            let err = run_job(&config, bad, &reporter, CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, SitemarkError::Validation { .. }));
        }

        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, JobEvent::Error { .. })));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn job_with_one_failing_page() {
        let server = MockServer::start().await;
        let base = server.uri();

        mount_page(&server, "/sitemap.xml", 200, sitemap(&base, &["/b", "/a", "/missing"])).await;
        mount_page(&server, "/a", 200, html("Alpha", "alpha text")).await;
        mount_page(&server, "/b", 200, html("Beta", "beta text")).await;
        mount_page(&server, "/missing", 404, String::new()).await;

        let (config, dir) = test_config();
        let reporter = RecordingReporter::default();
        let sitemap_url = format!("{base}/sitemap.xml");

        let report = run_job(&config, &sitemap_url, &reporter, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.page_count, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.summary.submitted, 3);

        let text = std::fs::read_to_string(&report.document.path).unwrap();
        assert_eq!(text.matches("](#page-").count(), 2);
        assert_eq!(text.matches("<div id='page-").count(), 2);
        assert!(text.find("# Alpha").unwrap() < text.find("# Beta").unwrap());
        assert!(text.contains("alpha text"));
        assert!(!text.contains("menu"));

        let events = reporter.events();
        let missing_url = format!("{base}/missing");
        let errors: Vec<&JobEvent> = events
            .iter()
            .filter(|e| matches!(e, JobEvent::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message().contains(&missing_url));

        assert!(events.contains(&JobEvent::log("found 3 pages")));
        assert!(events.contains(&JobEvent::progress("fetching: 3/3")));
        assert!(events.contains(&JobEvent::progress("generating document")));
        assert_eq!(
            events.last(),
            Some(&JobEvent::Complete {
                download_url: format!("/download/{}", report.document.filename),
                message: "complete".into(),
            })
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn empty_sitemap_fetches_nothing() {
        let server = MockServer::start().await;
        mount_page(&server, "/sitemap.xml", 200, sitemap("", &[])).await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (config, dir) = test_config();
        let reporter = RecordingReporter::default();

        let err = run_job(
            &config,
            &format!("{}/sitemap.xml", server.uri()),
            &reporter,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SitemarkError::NoUrlsFound { .. }));
        let events = reporter.events();
        assert!(matches!(events.last(), Some(JobEvent::Error { .. })));
        assert!(!events.iter().any(|e| matches!(e, JobEvent::Complete { .. })));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn unreachable_sitemap_is_terminal_error() {
        let server = MockServer::start().await;
        mount_page(&server, "/sitemap.xml", 503, String::new()).await;

        let (config, _dir) = test_config();
        let reporter = RecordingReporter::default();

        let err = run_job(
            &config,
            &format!("{}/sitemap.xml", server.uri()),
            &reporter,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SitemarkError::SitemapFetch { .. }));
        let terminal = reporter
            .events()
            .iter()
            .filter(|e| matches!(e, JobEvent::Error { .. } | JobEvent::Complete { .. }))
            .count();
        assert_eq!(terminal, 1);
    }

    #[tokio::test]
    async fn all_pages_failing_still_completes() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount_page(&server, "/sitemap.xml", 200, sitemap(&base, &["/x", "/y"])).await;
        mount_page(&server, "/x", 500, String::new()).await;
        mount_page(&server, "/y", 410, String::new()).await;

        let (config, dir) = test_config();
        let reporter = RecordingReporter::default();

        let report = run_job(
            &config,
            &format!("{base}/sitemap.xml"),
            &reporter,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.page_count, 0);
        assert_eq!(report.failures.len(), 2);
        let text = std::fs::read_to_string(&report.document.path).unwrap();
        assert!(text.contains("**Pages:** 0"));
        assert!(matches!(reporter.events().last(), Some(JobEvent::Complete { .. })));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn cancelled_job_reports_error() {
        let server = MockServer::start().await;
        let base = server.uri();
        mount_page(&server, "/sitemap.xml", 200, sitemap(&base, &["/slow"])).await;
        Mock::given(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(html("Slow", "late"))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let (config, dir) = test_config();
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            run_job(&config, &format!("{base}/sitemap.xml"), &reporter, cancel),
        )
        .await
        .expect("job did not stop after cancellation")
        .unwrap_err();

        assert!(matches!(err, SitemarkError::Cancelled));
        assert!(matches!(reporter.events().last(), Some(JobEvent::Error { .. })));
        assert!(!dir.exists());
    }
}
