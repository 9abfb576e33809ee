//! Single-document assembler.
//!
//! Takes the successful pages of a job, in any order, and renders one
//! Markdown document: a table of contents followed by one anchored section
//! per page. Pages are sorted by URL first, so the output depends only on
//! the set of pages and the timestamp.

use chrono::{DateTime, TimeZone};
use tracing::{debug, instrument};

use sitemark_shared::PageContent;

use crate::toc::{self, TocEntry};

/// Format of the timestamp embedded in the TOC header.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub text: String,
    pub toc: Vec<TocEntry>,
}

impl AssembledDocument {
    pub fn page_count(&self) -> usize {
        self.toc.len()
    }
}

/// Sort pages by URL, ascending.
pub fn sort_pages(pages: &mut [PageContent]) {
    pages.sort_by(|a, b| a.url.cmp(&b.url));
}

/// Render `pages` into one document.
#[instrument(skip_all, fields(pages = pages.len(), sitemap = %sitemap_url))]
pub fn assemble<Tz>(
    mut pages: Vec<PageContent>,
    sitemap_url: &str,
    generated_at: &DateTime<Tz>,
) -> AssembledDocument
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    sort_pages(&mut pages);

    let entries = toc::build_toc(&pages);
    let timestamp = generated_at.format(TIMESTAMP_FORMAT).to_string();

    let mut text = toc::render_toc(&entries, sitemap_url, &timestamp);
    text.push_str("\n\n# Content\n\n");

    for (entry, page) in entries.iter().zip(&pages) {
        text.push_str(&render_section(entry, page));
    }

    debug!(bytes = text.len(), "document assembled");

    AssembledDocument {
        text,
        toc: entries,
    }
}

/// One body section: anchor, heading, source link, body, separators.
fn render_section(entry: &TocEntry, page: &PageContent) -> String {
    format!(
        "\n\n<div id='{anchor}'></div>\n\n# {title}\n\n> Source: {source}\n\n---\n\n{body}\n\n---\n\n",
        anchor = entry.anchor,
        title = page.title,
        source = toc::url_link(&page.url),
        body = page.body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};

    fn page(url: &str, title: &str, body: &str) -> PageContent {
        PageContent {
            url: url.into(),
            title: title.into(),
            body: body.into(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn pages_are_sorted_by_url() {
        let pages = vec![
            page("https://a.example/zeta", "Zeta", "z body"),
            page("https://a.example/alpha", "Alpha", "a body"),
            page("https://a.example/mid", "Mid", "m body"),
        ];
        let doc = assemble(pages, "https://a.example/sitemap.xml", &fixed_time());

        let titles: Vec<&str> = doc.toc.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Mid", "Zeta"]);

        let alpha = doc.text.find("# Alpha").unwrap();
        let mid = doc.text.find("# Mid").unwrap();
        let zeta = doc.text.find("# Zeta").unwrap();
        assert!(alpha < mid && mid < zeta);
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let a = page("https://a.example/a", "A", "first");
        let b = page("https://a.example/b", "B", "second");
        let c = page("https://a.example/c", "C", "third");

        let one = assemble(vec![a.clone(), b.clone(), c.clone()], "s", &fixed_time());
        let two = assemble(vec![c, a, b], "s", &fixed_time());
        assert_eq!(one.text, two.text);
    }

    #[test]
    fn each_page_gets_an_anchored_section() {
        let pages = vec![
            page("https://a.example/1", "One", "body one"),
            page("https://a.example/2", "Two", "body two"),
        ];
        let doc = assemble(pages, "https://a.example/sitemap.xml", &fixed_time());

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.text.matches("<div id='page-").count(), 2);
        assert!(doc.text.contains("<div id='page-0'></div>\n\n# One\n\n> Source: [https://a.example/1](https://a.example/1)\n\n---\n\nbody one\n\n---"));
        assert!(doc.text.contains("- [Two](#page-1)"));
    }

    #[test]
    fn source_link_survives_parentheses() {
        let pages = vec![page("https://a.example/Rust_(language)", "Rust", "b")];
        let doc = assemble(pages, "https://a.example/sitemap.xml", &fixed_time());
        assert!(doc.text.contains(
            "> Source: [https://a.example/Rust_(language)](<https://a.example/Rust_(language)>)"
        ));
    }

    #[test]
    fn timestamp_is_embedded() {
        let doc = assemble(Vec::new(), "s", &fixed_time());
        assert!(doc.text.contains("**Generated at:** 2024-05-01 12:30:00"));
    }

    #[test]
    fn empty_page_set_renders_header_only() {
        let doc = assemble(Vec::new(), "https://a.example/sitemap.xml", &Local::now());
        assert_eq!(doc.page_count(), 0);
        assert!(doc.text.contains("**Pages:** 0"));
        assert!(doc.text.contains("# Content"));
        assert!(!doc.text.contains("<div id="));
    }
}
