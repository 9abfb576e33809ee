//! Table of contents for the assembled document.
//!
//! Entries are built from pages that are already in final (URL) order; the
//! entry index doubles as the `page-N` anchor of the matching body section.

use tracing::{debug, instrument};

use sitemark_shared::PageContent;

/// One linked line in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Zero-based position in the document.
    pub index: usize,
    /// Anchor id of the page's body section, e.g. `page-3`.
    pub anchor: String,
    pub title: String,
    pub url: String,
}

impl TocEntry {
    /// Render as a Markdown list item linking to the page anchor.
    pub fn to_markdown(&self) -> String {
        format!(
            "- [{}](#{})  *({})*",
            escape_link_text(&self.title),
            self.anchor,
            self.url
        )
    }
}

/// Anchor id for the page at `index`.
pub fn anchor_for(index: usize) -> String {
    format!("page-{index}")
}

/// Build one entry per page, numbering them in the order given.
#[instrument(skip_all, fields(page_count = pages.len()))]
pub fn build_toc(pages: &[PageContent]) -> Vec<TocEntry> {
    let entries: Vec<TocEntry> = pages
        .iter()
        .enumerate()
        .map(|(index, page)| TocEntry {
            index,
            anchor: anchor_for(index),
            title: page.title.clone(),
            url: page.url.clone(),
        })
        .collect();

    debug!(entries = entries.len(), "TOC built");
    entries
}

/// Render the table of contents section.
///
/// The header carries the source sitemap, the generation timestamp, and the
/// page count, followed by one list item per entry.
pub fn render_toc(entries: &[TocEntry], sitemap_url: &str, generated_at: &str) -> String {
    let mut lines = vec![
        "# Table of Contents\n".to_string(),
        format!("**Source sitemap:** {}\n", url_link(sitemap_url)),
        format!("**Generated at:** {generated_at}\n"),
        format!("**Pages:** {}\n", entries.len()),
        "---\n".to_string(),
    ];
    lines.extend(entries.iter().map(TocEntry::to_markdown));
    lines.join("\n")
}

/// Escape brackets so a title cannot break out of the link text.
fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

/// `[url](url)`, with the destination in angle brackets when the URL holds
/// spaces, parentheses, or angle brackets.
pub(crate) fn url_link(url: &str) -> String {
    let destination = if url.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", url.replace('<', "\\<").replace('>', "\\>"))
    } else {
        url.to_string()
    };
    format!("[{}]({destination})", escape_link_text(url))
}
