//! Sitemap XML extraction.
//!
//! Sitemaps use XML namespaces and are frequently malformed in the wild, so
//! entries are pulled out of the raw text with patterns instead of a parser.

use std::sync::LazyLock;

use regex::Regex;

use super::UrlEntry;

static URL_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<url>\s*<loc>([^<]+)</loc>(?:\s*<lastmod>([^<]+)</lastmod>)?").unwrap()
});

static SITEMAP_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<sitemap>\s*<loc>([^<]+)</loc>(?:\s*<lastmod>([^<]+)</lastmod>)?").unwrap()
});

static INDEX_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?sitemapindex").unwrap());

/// A fetched sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// A sitemap index whose entries point at further sitemaps.
    Index(Vec<UrlEntry>),
    /// A leaf sitemap whose entries are pages.
    UrlSet(Vec<UrlEntry>),
}

impl SitemapDocument {
    /// Entries of the document, whatever they point at.
    pub fn entries(&self) -> &[UrlEntry] {
        match self {
            SitemapDocument::Index(entries) | SitemapDocument::UrlSet(entries) => entries,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, SitemapDocument::Index(_))
    }
}

/// Classify a sitemap body and extract its `(loc, lastmod)` pairs.
pub fn parse_sitemap_document(body: &str) -> SitemapDocument {
    if is_sitemap_index(body) {
        SitemapDocument::Index(extract_entries(&SITEMAP_ENTRY, body))
    } else {
        SitemapDocument::UrlSet(extract_entries(&URL_ENTRY, body))
    }
}

/// Whether the body is a sitemap index rather than a leaf sitemap.
pub fn is_sitemap_index(body: &str) -> bool {
    INDEX_TAG.is_match(body)
}

fn extract_entries(pattern: &Regex, body: &str) -> Vec<UrlEntry> {
    pattern
        .captures_iter(body)
        .filter_map(|caps| {
            let loc = unescape_xml(caps.get(1)?.as_str().trim());
            if loc.is_empty() {
                return None;
            }
            let lastmod = caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty());
            Some(UrlEntry::new(loc, lastmod))
        })
        .collect()
}

/// Unescape the five predefined XML entities.
pub fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
