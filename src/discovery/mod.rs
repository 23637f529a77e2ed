//! Sitemap discovery: fetching, parsing and recency sampling of page URLs.

pub mod sampler;
pub mod sitemap;
pub mod xml;

pub use sampler::{ensure_homepage, sample};
pub use sitemap::SitemapFetcher;
pub use xml::{parse_sitemap_document, SitemapDocument};

use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::Settings;

/// Error type for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl DiscoveryError {
    pub(crate) fn from_request(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            DiscoveryError::Timeout(url.to_string())
        } else {
            DiscoveryError::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// A page (or sub-sitemap) listed in a sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlEntry {
    pub url: String,
    /// Raw `lastmod` value; `None` means undated.
    pub lastmod: Option<String>,
}

impl UrlEntry {
    pub fn new(url: impl Into<String>, lastmod: Option<String>) -> Self {
        Self {
            url: url.into(),
            lastmod,
        }
    }
}

/// Remove duplicate URLs, keeping the first occurrence of each.
pub fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Resolve the page URLs to turn into scenarios.
///
/// With sitemaps disabled only the site root is used. In sample mode each
/// sub-sitemap contributes its most recent entries and the homepage is always
/// included. `MAX_URLS` caps the final list.
pub async fn discover_urls(settings: &Settings) -> Result<Vec<String>, DiscoveryError> {
    if !settings.sitemap_enabled {
        return Ok(vec![settings.site_url.clone()]);
    }

    let fetcher = SitemapFetcher::new(settings, &settings.sitemap_url)?;

    let urls = if settings.sample_mode {
        match sample_urls(&fetcher, settings).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!("Sample mode failed ({}), falling back to a full fetch", e);
                let entries = fetcher.fetch_sitemap(&settings.sitemap_url).await?;
                let mut urls = unique_urls(entries);
                urls.truncate(settings.sample_size);
                urls
            }
        }
    } else {
        unique_urls(fetcher.fetch_sitemap(&settings.sitemap_url).await?)
    };

    Ok(apply_max_urls(urls, settings.max_urls))
}

/// Sample `sample_size` recent URLs from each sub-sitemap.
pub async fn sample_urls(
    fetcher: &SitemapFetcher,
    settings: &Settings,
) -> Result<Vec<String>, DiscoveryError> {
    let root_url = &settings.sitemap_url;
    if fetcher.is_html_response(root_url).await {
        sitemap::report_html_sitemap(root_url);
        return Ok(Vec::new());
    }

    let mut urls = Vec::new();

    match fetcher.fetch_document(root_url).await? {
        SitemapDocument::Index(children) => {
            info!("Sitemap index with {} sub-sitemaps", children.len());
            for child in children {
                let entries = match fetcher.collect_entries(&child.url).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("Skipping {}: {}", child.url, e);
                        continue;
                    }
                };
                if entries.is_empty() {
                    warn!("{} has no URLs", child.url);
                    continue;
                }
                let selected = sample(&entries, settings.sample_size);
                info!(
                    "{}: {}/{} most recent URLs selected",
                    child.url,
                    selected.len(),
                    entries.len()
                );
                urls.extend(selected);
            }
        }
        SitemapDocument::UrlSet(entries) => {
            let selected = sample(&entries, settings.sample_size);
            info!(
                "{}/{} most recent URLs selected",
                selected.len(),
                entries.len()
            );
            urls.extend(selected);
        }
    }

    let mut urls = dedup_preserving_order(urls);
    if ensure_homepage(&mut urls, &settings.site_url) {
        info!("Added homepage {}", settings.site_url);
    }
    Ok(urls)
}

fn unique_urls(entries: Vec<UrlEntry>) -> Vec<String> {
    dedup_preserving_order(entries.into_iter().map(|e| e.url).collect())
}

fn apply_max_urls(mut urls: Vec<String>, max_urls: Option<usize>) -> Vec<String> {
    if let Some(max) = max_urls {
        if urls.len() > max {
            info!("Limiting to {} URLs ({} found)", max, urls.len());
            urls.truncate(max);
        }
    }
    urls
}
