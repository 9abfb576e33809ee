//! sitemark CLI: sitemap to single Markdown document.
//!
//! Runs one-off jobs from the terminal or serves the WebSocket job
//! interface with document downloads.

mod commands;
mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
