//! Content extraction and HTML-to-Markdown conversion.
//!
//! Given the raw HTML of one page this crate:
//! 1. Extracts the `<title>` (falling back to the page URL)
//! 2. Removes boilerplate elements (navigation, scripts, headers, ...)
//! 3. Resolves relative link targets against the page URL
//! 4. Selects the main content region by a fixed priority list
//! 5. Converts that region to Markdown via `htmd` (ATX headings, links kept)
//! 6. Runs the cleanup pipeline

mod cleanup;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};
use url::Url;

use sitemark_shared::{Result, SitemarkError};

/// Elements removed before the content region is chosen.
pub const IGNORED_TAGS: [&str; 8] = [
    "script", "style", "nav", "footer", "iframe", "noscript", "aside", "header",
];

static IGNORED_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(&IGNORED_TAGS.join(", ")).expect("valid selector"));

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which part of the document was treated as the main content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRegion {
    /// The first `<main>` element.
    Main,
    /// The first `<article>` element.
    Article,
    /// The element with `id="content"`.
    IdContent,
    /// The first element with class `content`.
    ClassContent,
    /// The `<body>` element.
    Body,
    /// The whole document.
    Document,
}

impl ContentRegion {
    /// Regions tried in order; the first one present wins.
    pub const PRIORITY: [ContentRegion; 5] = [
        ContentRegion::Main,
        ContentRegion::Article,
        ContentRegion::IdContent,
        ContentRegion::ClassContent,
        ContentRegion::Body,
    ];

    fn selector(self) -> Option<&'static str> {
        match self {
            Self::Main => Some("main"),
            Self::Article => Some("article"),
            Self::IdContent => Some("#content"),
            Self::ClassContent => Some(".content"),
            Self::Body => Some("body"),
            Self::Document => None,
        }
    }
}

/// Result of extracting one page.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// Trimmed `<title>` text, or the page URL.
    pub title: String,
    /// Cleaned Markdown of the content region.
    pub markdown: String,
    /// The region the Markdown came from.
    pub region: ContentRegion,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the title and main content of `html`, fetched from `url`, as Markdown.
#[instrument(skip_all, fields(url = %url))]
pub fn extract(html: &str, url: &str) -> Result<ExtractedPage> {
    let mut doc = Html::parse_document(html);

    let title = extract_title(&doc).unwrap_or_else(|| url.to_string());

    strip_boilerplate(&mut doc);
    if let Ok(base) = Url::parse(url) {
        resolve_links(&mut doc, &base);
    }

    let (region, region_html) = select_content(&doc);
    let raw_markdown = to_markdown(&region_html)?;
    let markdown = cleanup::run_pipeline(&raw_markdown);

    debug!(
        ?region,
        title = %title,
        len = markdown.len(),
        "page extracted"
    );

    Ok(ExtractedPage {
        title,
        markdown,
        region,
    })
}

/// The `<title>` text with whitespace collapsed, if present and non-empty.
pub fn extract_title(doc: &Html) -> Option<String> {
    let title = doc.select(&TITLE_SELECTOR).next()?;
    let text = title.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if text.is_empty() { None } else { Some(text) }
}

/// Detach every element listed in [`IGNORED_TAGS`] from the tree.
///
/// Detached nodes stay in the tree's storage and are still visited by
/// [`Html::select`]; [`select_content`] skips them.
pub fn strip_boilerplate(doc: &mut Html) {
    let ids: Vec<_> = doc.select(&IGNORED_SELECTOR).map(|el| el.id()).collect();

    for id in &ids {
        if let Some(mut node) = doc.tree.get_mut(*id) {
            node.detach();
        }
    }

    debug!(removed = ids.len(), "boilerplate elements removed");
}

/// Rewrite relative `<a href>` targets to absolute URLs.
///
/// Pages are merged into one document, so a relative link would otherwise
/// point somewhere meaningless. Fragments and absolute links are left alone.
pub fn resolve_links(doc: &mut Html, base: &Url) {
    let ids: Vec<_> = doc.select(&LINK_SELECTOR).map(|el| el.id()).collect();
    let mut resolved = 0usize;

    for id in ids {
        let Some(mut node) = doc.tree.get_mut(id) else {
            continue;
        };
        let Node::Element(element) = node.value() else {
            continue;
        };
        for (name, value) in element.attrs.iter_mut() {
            if &*name.local != "href" {
                continue;
            }
            if let Some(absolute) = resolve_href(base, &**value) {
                *value = absolute.to_string().into();
                resolved += 1;
            }
        }
    }

    debug!(resolved, "relative links resolved");
}

fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || Url::parse(href).is_ok() {
        return None;
    }
    base.join(href).ok()
}

/// Pick the content region by [`ContentRegion::PRIORITY`] and return its HTML.
///
/// Only elements still attached to the document count. Falls back to the
/// whole document when none of the regions exist.
pub fn select_content(doc: &Html) -> (ContentRegion, String) {
    for region in ContentRegion::PRIORITY {
        let Some(sel_str) = region.selector() else {
            continue;
        };
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).find(|el| is_attached(doc, el)) {
            return (region, el.html());
        }
    }

    (ContentRegion::Document, doc.root_element().html())
}

fn is_attached(doc: &Html, el: &ElementRef) -> bool {
    let root = doc.tree.root().id();
    el.ancestors().any(|node| node.id() == root)
}

/// Convert an HTML fragment to Markdown with ATX headings.
pub fn to_markdown(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(IGNORED_TAGS.to_vec())
        .build();

    converter
        .convert(html)
        .map_err(|e| SitemarkError::Conversion(format!("htmd conversion failed: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
