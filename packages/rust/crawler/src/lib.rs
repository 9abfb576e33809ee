//! Page fetching and bounded-concurrency scheduling.
//!
//! This crate provides:
//! - [`fetcher`]: shared HTTP client construction and the [`PageFetcher`]
//!   that turns one URL into one [`FetchOutcome`](sitemark_shared::FetchOutcome)
//! - [`scheduler`]: the [`Scheduler`] that fans a URL batch out across a
//!   fixed concurrency budget and streams outcomes in completion order

pub mod fetcher;
pub mod scheduler;

pub use fetcher::{HttpOptions, PageExtractor, PageFetcher, build_client};
pub use scheduler::{BatchSummary, Scheduler};
