//! Sitemap XML parser.
//!
//! Collects every `<loc>` that is a direct child of a `<url>` element, in the
//! sitemaps.org namespace or in no namespace at all. `<sitemap><loc>` entries
//! of a sitemap index are counted separately and never followed.

use std::collections::HashSet;

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};

use sitemark_shared::{Result, SitemarkError};

/// Namespace declared by standard sitemaps.
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed representation of a sitemap document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSitemap {
    /// Distinct page URLs, in first-seen order.
    pub urls: Vec<String>,
    /// `<sitemap><loc>` references found in a sitemap index.
    pub nested_sitemaps: Vec<String>,
}

/// The role an open element plays in the sitemap grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Url,
    Sitemap,
    PageLoc,
    SitemapLoc,
    Other,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a sitemap document. Fails only when the XML is not well-formed.
pub(crate) fn parse_sitemap(xml: &str) -> Result<ParsedSitemap> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Tag> = Vec::new();
    let mut seen_root = false;
    let mut loc_text = String::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut parsed = ParsedSitemap::default();

    loop {
        let (ns, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| SitemarkError::parse(format!("malformed XML: {e}")))?;

        match event {
            Event::Start(ref e) => {
                seen_root = true;
                let local = e.local_name();
                let tag = classify(&ns, local.as_ref(), stack.last().copied());
                if matches!(tag, Tag::PageLoc | Tag::SitemapLoc) {
                    loc_text.clear();
                }
                stack.push(tag);
            }
            Event::Empty(_) => seen_root = true,
            Event::Text(ref e) => {
                if in_loc(&stack) {
                    let text = e
                        .unescape()
                        .map_err(|err| SitemarkError::parse(format!("bad text in <loc>: {err}")))?;
                    loc_text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if in_loc(&stack) {
                    loc_text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(_) => match stack.pop() {
                Some(Tag::PageLoc) => {
                    let url = loc_text.trim();
                    if !url.is_empty() && seen.insert(url.to_string()) {
                        parsed.urls.push(url.to_string());
                    }
                }
                Some(Tag::SitemapLoc) => {
                    let url = loc_text.trim();
                    if !url.is_empty() {
                        parsed.nested_sitemaps.push(url.to_string());
                    }
                }
                Some(_) => {}
                None => return Err(SitemarkError::parse("unexpected closing tag")),
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(SitemarkError::parse("document has no root element"));
    }
    if !stack.is_empty() {
        return Err(SitemarkError::parse(format!(
            "unexpected end of document with {} unclosed element(s)",
            stack.len()
        )));
    }

    Ok(parsed)
}

/// Decide what an opening tag means given its namespace and parent.
fn classify(ns: &ResolveResult<'_>, local: &[u8], parent: Option<Tag>) -> Tag {
    if !in_sitemap_namespace(ns) {
        return Tag::Other;
    }

    match (local, parent) {
        (b"url", _) => Tag::Url,
        (b"sitemap", _) => Tag::Sitemap,
        (b"loc", Some(Tag::Url)) => Tag::PageLoc,
        (b"loc", Some(Tag::Sitemap)) => Tag::SitemapLoc,
        _ => Tag::Other,
    }
}

fn in_sitemap_namespace(ns: &ResolveResult<'_>) -> bool {
    match ns {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => *uri == SITEMAP_NS.as_bytes(),
        ResolveResult::Unknown(_) => false,
    }
}

fn in_loc(stack: &[Tag]) -> bool {
    matches!(stack.last(), Some(Tag::PageLoc | Tag::SitemapLoc))
}
