//! CLI command definitions, routing, and tracing setup.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use sitemark_core::pipeline::{ProgressReporter, SilentProgress, run_job};
use sitemark_shared::{AppConfig, JobConfig, JobEvent, init_config, load_config};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::server;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitemark: turn a sitemap into one navigable Markdown document.
#[derive(Parser)]
#[command(
    name = "sitemark",
    version,
    about = "Fetch every page of a sitemap and merge it into one Markdown document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Convert one sitemap into a Markdown document.
    Run {
        /// Sitemap URL to process.
        sitemap_url: String,

        /// Output directory for the document.
        #[arg(short, long)]
        out: Option<String>,

        /// Maximum number of pages fetched at once.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Suppress the progress spinner.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Serve the WebSocket job interface and document downloads.
    Serve {
        /// Address to bind (defaults to the configured one).
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (defaults to the configured one).
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory generated documents are written to and served from.
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitemark=info",
        1 => "sitemark=debug",
        _ => "sitemark=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            sitemap_url,
            out,
            concurrency,
            quiet,
        } => cmd_run(&sitemap_url, out.as_deref(), concurrency, quiet).await,
        Command::Serve { bind, port, out } => cmd_serve(bind, port, out.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the job configuration from the config file and CLI overrides.
fn job_config(app: &AppConfig, out: Option<&str>, concurrency: Option<usize>) -> JobConfig {
    let mut job = JobConfig::from(app);
    if let Some(out) = out {
        job.output_dir = PathBuf::from(out);
    }
    if let Some(concurrency) = concurrency {
        job.concurrency = concurrency.max(1);
    }
    job
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    sitemap_url: &str,
    out: Option<&str>,
    concurrency: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let config = load_config()?;
    let job = job_config(&config, out, concurrency);

    info!(
        sitemap = sitemap_url,
        concurrency = job.concurrency,
        out = %job.output_dir.display(),
        "starting job"
    );

    // Ctrl-C cancels the job; in-flight fetches are aborted.
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling job");
                cancel.cancel();
            }
        })
    };

    let reporter: Box<dyn ProgressReporter> = if quiet {
        Box::new(SilentProgress)
    } else {
        Box::new(CliProgress::new())
    };

    let result = run_job(&job, sitemap_url, reporter.as_ref(), cancel).await;
    interrupt.abort();
    drop(reporter);

    let report = result?;

    println!();
    println!("  Document generated!");
    println!("  Pages:   {}", report.page_count);
    println!("  Failed:  {}", report.failures.len());
    println!("  Path:    {}", report.document.path.display());
    println!("  SHA-256: {}", report.document.sha256);
    println!("  Time:    {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_serve(bind: Option<String>, port: Option<u16>, out: Option<&str>) -> Result<()> {
    let config = load_config()?;

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = port.unwrap_or(config.server.port);
    let ip: IpAddr = bind
        .parse()
        .map_err(|e| eyre!("invalid bind address '{bind}': {e}"))?;
    let addr = SocketAddr::new(ip, port);

    let job = job_config(&config, out, None);
    server::serve(addr, job).await
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Prints job events above an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn report(&self, event: JobEvent) {
        match event {
            JobEvent::Progress { message } => self.spinner.set_message(message),
            JobEvent::Log { message } => self.spinner.println(format!("  {message}")),
            JobEvent::Error { message } => self.spinner.println(format!("  ! {message}")),
            JobEvent::Complete { .. } => self.spinner.finish_and_clear(),
        }
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
