//! Shared types, error model, and configuration for sitemark.
//!
//! This crate is the foundation depended on by all other sitemark crates.
//! It provides:
//! - [`SitemarkError`]: the unified error type
//! - Domain types ([`FetchOutcome`], [`PageContent`], [`JobEvent`], [`JobId`])
//! - Configuration ([`AppConfig`], [`JobConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BROWSER_USER_AGENT, DefaultsConfig, JobConfig, SITEMAP_USER_AGENT, ServerConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, SitemarkError};
pub use types::{FetchOutcome, JobEvent, JobId, PageContent, PageFailure};
