//! HTTP server: WebSocket job interface and document downloads.
//!
//! - `GET /ws` opens a job. The first text message is the sitemap URL; every
//!   job event is then sent as one JSON text message until `complete` or the
//!   terminating `error`.
//! - `GET /download/:filename` returns a generated document.
//! - `GET /healthz` answers 200.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use color_eyre::eyre::{Result, eyre};
use sitemark_core::output::resolve_download;
use sitemark_core::pipeline::{ChannelReporter, run_job};
use sitemark_shared::{JobConfig, JobEvent, JobId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

/// Content type of generated documents.
const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

#[derive(Clone)]
struct AppState {
    job: Arc<JobConfig>,
}

/// Build the router for `config`.
pub(crate) fn router(config: JobConfig) -> Router {
    let download_route = format!("{}/:filename", config.download_route.trim_end_matches('/'));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .route(&download_route, get(download))
        .with_state(AppState {
            job: Arc::new(config),
        })
}

/// Serve until Ctrl-C.
pub(crate) async fn serve(addr: SocketAddr, config: JobConfig) -> Result<()> {
    let out = config.output_dir.display().to_string();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;

    info!(%addr, %out, "server listening");
    println!("sitemark listening on http://{addr} (WebSocket: ws://{addr}/ws)");

    axum::serve(listener, router(config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .map_err(|e| eyre!("server error: {e}"))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let Some(path) = resolve_download(&state.job.output_dir, &filename) else {
        return not_found();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!(%filename, bytes = bytes.len(), "serving document");
            (
                [
                    (header::CONTENT_TYPE, MARKDOWN_CONTENT_TYPE.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read document");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "file not found" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// WebSocket jobs
// ---------------------------------------------------------------------------

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| {
        let job_id = JobId::new();
        handle_socket(socket, state).instrument(info_span!("job", %job_id))
    })
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let Some(sitemap_url) = first_text(&mut socket).await else {
        debug!("client left before sending a sitemap URL");
        return;
    };
    let sitemap_url = sitemap_url.trim().to_string();
    info!(sitemap = %sitemap_url, "job requested");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reporter = ChannelReporter::new(tx);
    let cancel = CancellationToken::new();

    let job = run_job(&state.job, &sitemap_url, &reporter, cancel.clone());
    tokio::pin!(job);

    let mut connected = true;
    let result = loop {
        tokio::select! {
            result = &mut job => break result,
            Some(event) = rx.recv() => {
                if connected && !send_event(&mut socket, &event).await {
                    connected = false;
                    cancel.cancel();
                }
            }
            msg = socket.recv(), if connected => {
                if matches!(msg, None | Some(Err(_)) | Some(Ok(Message::Close(_)))) {
                    info!("client disconnected, cancelling job");
                    connected = false;
                    cancel.cancel();
                }
            }
        }
    };

    // Events reported after the last poll, including the terminal one.
    while let Ok(event) = rx.try_recv() {
        if connected && !send_event(&mut socket, &event).await {
            connected = false;
        }
    }

    match result {
        Ok(report) => info!(file = %report.document.filename, "job finished"),
        Err(e) => warn!(error = %e, "job failed"),
    }

    if connected {
        let _ = socket.send(Message::Close(None)).await;
    }
}

/// Wait for the first text message; `None` if the client leaves first.
async fn first_text(socket: &mut WebSocket) -> Option<String> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

/// Send one event as JSON; `false` once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &JobEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "event not serializable");
            return true;
        }
    };

    match socket.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "websocket send failed");
            false
        }
    }
}
