//! Sitemap fetching.
//!
//! Fetches a sitemap (or sitemap index) and returns its page entries with
//! their `lastmod` dates. Sub-sitemaps are fetched one at a time.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, info, warn};

use super::xml::{parse_sitemap_document, SitemapDocument};
use super::{DiscoveryError, UrlEntry};
use crate::config::Settings;

/// Timeout of the HEAD request used to sniff the content type.
const HEAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on documents fetched for one sitemap tree.
const MAX_SITEMAPS: usize = 100;

/// HTTP fetcher for sitemap documents.
pub struct SitemapFetcher {
    client: Client,
}

impl SitemapFetcher {
    /// Create a fetcher for `target` using the configured headers and timeout.
    pub fn new(settings: &Settings, target: &str) -> Result<Self, DiscoveryError> {
        let verify = settings.verify_tls(target);
        if !verify {
            info!("TLS verification disabled for {}", target);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &settings.request_headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Skipping invalid request header {:?}", name),
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!verify)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| DiscoveryError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Whether `url` answers a HEAD request with an HTML content type.
    ///
    /// Any failure counts as "not HTML"; the following GET reports real errors.
    pub async fn is_html_response(&self, url: &str) -> bool {
        match self.client.head(url).timeout(HEAD_TIMEOUT).send().await {
            Ok(response) => response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.contains("text/html")),
            Err(e) => {
                debug!("HEAD {} failed: {}", url, e);
                false
            }
        }
    }

    /// Download and classify one sitemap document.
    pub async fn fetch_document(&self, url: &str) -> Result<SitemapDocument, DiscoveryError> {
        debug!("Fetching sitemap: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DiscoveryError::from_request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DiscoveryError::from_request(url, e))?;

        Ok(parse_sitemap_document(&body))
    }

    /// Fetch every page entry reachable from `url`.
    ///
    /// An HTML response is a misconfigured endpoint: guidance is logged and
    /// the result is empty rather than an error. If `url` names
    /// `sitemap_index.xml` and yields nothing, `sitemap.xml` is tried once.
    pub async fn fetch_sitemap(&self, url: &str) -> Result<Vec<UrlEntry>, DiscoveryError> {
        let primary = self.fetch_tree(url).await;

        let found_urls = matches!(&primary, Ok(entries) if !entries.is_empty());
        if found_urls || !url.contains("sitemap_index.xml") {
            return primary;
        }

        let fallback = url.replace("sitemap_index.xml", "sitemap.xml");
        match &primary {
            Err(e) => warn!("{}; retrying with {}", e, fallback),
            Ok(_) => warn!("{} has no URLs; retrying with {}", url, fallback),
        }
        self.fetch_tree(&fallback).await
    }

    async fn fetch_tree(&self, url: &str) -> Result<Vec<UrlEntry>, DiscoveryError> {
        if self.is_html_response(url).await {
            report_html_sitemap(url);
            return Ok(Vec::new());
        }
        self.collect_entries(url).await
    }

    /// Fetch `url` and, for an index, each sub-sitemap in turn.
    ///
    /// Only a failure of `url` itself is an error; broken sub-sitemaps are
    /// logged and skipped.
    pub async fn collect_entries(&self, url: &str) -> Result<Vec<UrlEntry>, DiscoveryError> {
        let mut entries = Vec::new();
        let mut processed = HashSet::new();
        let mut pending = vec![url.to_string()];

        while !pending.is_empty() {
            let sitemap_url = pending.remove(0);
            if processed.contains(&sitemap_url) || processed.len() >= MAX_SITEMAPS {
                continue;
            }
            processed.insert(sitemap_url.clone());

            let document = match self.fetch_document(&sitemap_url).await {
                Ok(doc) => doc,
                Err(e) if sitemap_url == url => return Err(e),
                Err(e) => {
                    warn!("Skipping sub-sitemap {}: {}", sitemap_url, e);
                    continue;
                }
            };

            match document {
                SitemapDocument::Index(children) => {
                    debug!(
                        "{} is a sitemap index with {} sub-sitemaps",
                        sitemap_url,
                        children.len()
                    );
                    pending.extend(
                        children
                            .into_iter()
                            .map(|c| c.url)
                            .filter(|u| !processed.contains(u)),
                    );
                }
                SitemapDocument::UrlSet(found) => {
                    debug!("Extracted {} URLs from {}", found.len(), sitemap_url);
                    entries.extend(found);
                }
            }
        }

        Ok(entries)
    }
}

pub(crate) fn report_html_sitemap(url: &str) {
    warn!("Sitemap {} returned HTML instead of XML", url);
    eprintln!("The sitemap is returning HTML instead of XML: {}", url);
    eprintln!("  This usually means that:");
    eprintln!("  - the sitemap requires authentication");
    eprintln!("  - the request is redirected to a login page");
    eprintln!("  - the sitemap URL is wrong");
    eprintln!("  - the server is blocking the request");
    eprintln!("  Try opening the sitemap in a browser, pointing SITEMAP_URL at a");
    eprintln!("  specific sitemap (e.g. post-sitemap.xml), or passing headers:");
    eprintln!("    REQUEST_HEADERS='{{\"Cookie\":\"session=xxx\"}}'");
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<?xml version="1.0"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{base}/post-sitemap.xml</loc></sitemap>
  <sitemap><loc>{base}/page-sitemap.xml</loc></sitemap>
</sitemapindex>"#;

    fn urlset(urls: &[(&str, Option<&str>)]) -> String {
        let mut xml = String::from("<urlset>");
        for (loc, lastmod) in urls {
            xml.push_str(&format!("<url><loc>{}</loc>", loc));
            if let Some(lm) = lastmod {
                xml.push_str(&format!("<lastmod>{}</lastmod>", lm));
            }
            xml.push_str("</url>");
        }
        xml.push_str("</urlset>");
        xml
    }

    fn fetcher(base: &str) -> SitemapFetcher {
        let settings = Settings::default();
        SitemapFetcher::new(&settings, base).unwrap()
    }

    #[tokio::test]
    async fn fetches_leaf_sitemap() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _head = server
            .mock("HEAD", "/sitemap.xml")
            .with_header("content-type", "application/xml")
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/sitemap.xml")
            .with_header("content-type", "application/xml")
            .with_body(urlset(&[
                ("https://example.com/", Some("2024-01-01")),
                ("https://example.com/about", None),
            ]))
            .create_async()
            .await;

        let entries = fetcher(&base)
            .fetch_sitemap(&format!("{}/sitemap.xml", base))
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-01-01"));
    }

    #[tokio::test]
    async fn follows_sitemap_index_in_order() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _head = server
            .mock("HEAD", mockito::Matcher::Any)
            .with_header("content-type", "text/xml")
            .create_async()
            .await;
        let _index = server
            .mock("GET", "/sitemap_index.xml")
            .with_body(INDEX.replace("{base}", &base))
            .create_async()
            .await;
        let _posts = server
            .mock("GET", "/post-sitemap.xml")
            .with_body(urlset(&[("https://example.com/post-1", None)]))
            .create_async()
            .await;
        let _pages = server
            .mock("GET", "/page-sitemap.xml")
            .with_body(urlset(&[("https://example.com/contact", None)]))
            .create_async()
            .await;

        let entries = fetcher(&base)
            .fetch_sitemap(&format!("{}/sitemap_index.xml", base))
            .await
            .unwrap();
        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/post-1", "https://example.com/contact"]
        );
    }

    #[tokio::test]
    async fn html_response_yields_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _head = server
            .mock("HEAD", "/sitemap.xml")
            .with_header("content-type", "text/html; charset=utf-8")
            .create_async()
            .await;
        let get = server
            .mock("GET", "/sitemap.xml")
            .with_body("<html></html>")
            .expect(0)
            .create_async()
            .await;

        let entries = fetcher(&base)
            .fetch_sitemap(&format!("{}/sitemap.xml", base))
            .await
            .unwrap();
        assert!(entries.is_empty());
        get.assert_async().await;
    }

    #[tokio::test]
    async fn sitemap_index_falls_back_to_sitemap_xml() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _head = server
            .mock("HEAD", mockito::Matcher::Any)
            .with_header("content-type", "application/xml")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/sitemap_index.xml")
            .with_status(404)
            .create_async()
            .await;
        let _fallback = server
            .mock("GET", "/sitemap.xml")
            .with_body(urlset(&[("https://example.com/", None)]))
            .create_async()
            .await;

        let entries = fetcher(&base)
            .fetch_sitemap(&format!("{}/sitemap_index.xml", base))
            .await
            .unwrap();
        assert_eq!(entries, vec![UrlEntry::new("https://example.com/", None)]);
    }

    #[tokio::test]
    async fn http_errors_surface_without_fallback() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _head = server
            .mock("HEAD", "/sitemap.xml")
            .with_header("content-type", "application/xml")
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/sitemap.xml")
            .with_status(500)
            .create_async()
            .await;

        let err = fetcher(&base)
            .fetch_sitemap(&format!("{}/sitemap.xml", base))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn broken_sub_sitemaps_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();
        let _head = server
            .mock("HEAD", mockito::Matcher::Any)
            .with_header("content-type", "application/xml")
            .create_async()
            .await;
        let _index = server
            .mock("GET", "/sitemap_index.xml")
            .with_body(INDEX.replace("{base}", &base))
            .create_async()
            .await;
        let _posts = server
            .mock("GET", "/post-sitemap.xml")
            .with_status(502)
            .create_async()
            .await;
        let _pages = server
            .mock("GET", "/page-sitemap.xml")
            .with_body(urlset(&[("https://example.com/contact", None)]))
            .create_async()
            .await;

        let entries = fetcher(&base)
            .fetch_sitemap(&format!("{}/sitemap_index.xml", base))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }
}
