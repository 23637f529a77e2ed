//! Recency sampling of sitemap entries.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::UrlEntry;

/// Pick up to `limit` URLs, most recently modified first.
///
/// Dated entries come first, newest to oldest (ties keep document order).
/// Undated entries follow in reverse document order, so entries listed
/// last are preferred when the sitemap carries no dates.
pub fn sample(entries: &[UrlEntry], limit: usize) -> Vec<String> {
    if limit == 0 || entries.is_empty() {
        return Vec::new();
    }

    let (mut dated, undated): (Vec<&UrlEntry>, Vec<&UrlEntry>) =
        entries.iter().partition(|e| e.lastmod.is_some());

    // Vec::sort_by is stable.
    dated.sort_by(|a, b| compare_recency(a, b));

    dated
        .into_iter()
        .chain(undated.into_iter().rev())
        .take(limit)
        .map(|e| e.url.clone())
        .collect()
}

/// Newest first; entries whose date cannot be parsed sort after parseable ones.
fn compare_recency(a: &UrlEntry, b: &UrlEntry) -> Ordering {
    let a = a.lastmod.as_deref().and_then(parse_lastmod);
    let b = b.lastmod.as_deref().and_then(parse_lastmod);
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Parse a sitemap `lastmod` value (W3C datetime subset).
pub fn parse_lastmod(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Make sure the site homepage is part of `urls`, inserting it first if not.
///
/// `site`, `site/`, `site/index.html` and `site/index.php` all count as the
/// homepage; trailing slashes are ignored.
pub fn ensure_homepage(urls: &mut Vec<String>, site_url: &str) -> bool {
    let site = site_url.trim_end_matches('/');
    let variants = [
        site.to_string(),
        format!("{}/index.html", site),
        format!("{}/index.php", site),
    ];

    let present = urls
        .iter()
        .any(|url| variants.iter().any(|v| v == url.trim_end_matches('/')));

    if !present {
        urls.insert(0, site_url.to_string());
    }
    !present
}
