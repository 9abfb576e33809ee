//! Job orchestration and document assembly for sitemark.
//!
//! This crate ties together sitemap discovery, bounded page fetching, and
//! single-document assembly into the end-to-end [`run_job`] workflow.

pub mod assembler;
pub mod output;
pub mod pipeline;
pub mod toc;

pub use assembler::{AssembledDocument, assemble};
pub use output::{WrittenDocument, document_filename, resolve_download, write_document};
pub use pipeline::{ChannelReporter, JobReport, ProgressReporter, SilentProgress, run_job};
pub use toc::TocEntry;
