//! Runtime settings resolved from the environment.
//!
//! Every component receives a `&Settings` instead of reading environment
//! variables itself. `.env` files are loaded by `main` before
//! [`Settings::from_env`] runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

/// Site crawled when `SITE_URL` is not set.
pub const DEFAULT_SITE_URL: &str = "https://wordpress.org";

/// Project id written into the configuration when `PROJECT_ID` is not set.
pub const DEFAULT_PROJECT_ID: &str = "backstop_default";

/// Root of all BackstopJS output.
pub const BASE_DATA_DIR: &str = "backstop_data";

/// Default engine scripts directory.
pub const DEFAULT_SCRIPTS_DIR: &str = "backstop_data/engine_scripts";

/// Generated BackstopJS configuration file.
pub const CONFIG_FILENAME: &str = "backstop.json";

/// Directory searched for bare `URL_LIST` filenames.
pub const URL_LISTS_DIR: &str = "url-lists";

/// Directory holding raw Puppeteer recordings.
pub const RECORDINGS_DIR: &str = "puppet";

/// Default network timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of URLs kept per sub-sitemap in sample mode.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// User agent sent when `REQUEST_HEADERS` is not set.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; BackstopJS-SitemapParser/1.0)";

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Project root; every relative location is resolved against it.
    pub root: PathBuf,
    /// URL list file given through `URL_LIST`.
    pub url_list: Option<String>,
    /// Site root, used as homepage and as base for relative sitemap paths.
    pub site_url: String,
    /// Fully resolved sitemap location.
    pub sitemap_url: String,
    /// BackstopJS project id.
    pub project_id: String,
    /// Data directory (bitmaps, reports), relative to `root`.
    pub data_dir: String,
    /// Engine scripts directory, relative to `root`.
    pub scripts_dir: String,
    /// Cap on the number of sitemap URLs turned into scenarios.
    pub max_urls: Option<usize>,
    /// Network timeout for sitemap requests.
    pub timeout: Duration,
    /// When false only the site root is used.
    pub sitemap_enabled: bool,
    /// When false the recordings directory is ignored.
    pub recordings_enabled: bool,
    /// Sample the most recent URLs of each sub-sitemap.
    pub sample_mode: bool,
    /// URLs kept per sub-sitemap in sample mode.
    pub sample_size: usize,
    /// Headers sent with every sitemap request.
    pub request_headers: BTreeMap<String, String>,
    /// Explicit TLS verification override (None = auto-detect).
    pub reject_unauthorized: Option<bool>,
    /// Verbose diagnostics.
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Build settings from the process environment, rooted at the current directory.
    pub fn from_env() -> Self {
        let mut settings = Self::from_lookup(|key| std::env::var(key).ok());
        if let Ok(cwd) = std::env::current_dir() {
            settings.root = cwd;
        }
        settings
    }

    /// Build settings from an arbitrary key lookup.
    ///
    /// Values that fail to parse are reported and replaced by their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let site_url = non_empty("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
        let sitemap_url = resolve_sitemap_url(&site_url, non_empty("SITEMAP_URL").as_deref());

        let data_dir = match non_empty("BACKSTOP_DATA_DIR") {
            Some(custom) => format!("{}/{}", BASE_DATA_DIR, custom.trim_matches('/')),
            None => BASE_DATA_DIR.to_string(),
        };

        let request_headers = match non_empty("REQUEST_HEADERS") {
            Some(raw) => parse_headers(&raw).unwrap_or_else(|e| {
                warn!("Ignoring REQUEST_HEADERS ({}), using defaults", e);
                default_headers()
            }),
            None => default_headers(),
        };

        Self {
            root: PathBuf::from("."),
            url_list: non_empty("URL_LIST"),
            site_url,
            sitemap_url,
            project_id: non_empty("PROJECT_ID").unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string()),
            data_dir,
            scripts_dir: non_empty("BACKSTOP_SCRIPTS_DIR")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SCRIPTS_DIR.to_string()),
            max_urls: parse_number(non_empty("MAX_URLS"), "MAX_URLS").filter(|n| *n > 0),
            timeout: Duration::from_millis(
                parse_number(non_empty("TIMEOUT"), "TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            sitemap_enabled: lookup("SITEMAP").as_deref() != Some("0"),
            recordings_enabled: lookup("PUPPET").as_deref() != Some("0"),
            sample_mode: is_truthy(lookup("SITEMAP_SAMPLE_MODE").as_deref()),
            sample_size: parse_number(non_empty("SAMPLE_SIZE"), "SAMPLE_SIZE")
                .unwrap_or(DEFAULT_SAMPLE_SIZE),
            request_headers,
            reject_unauthorized: lookup("REJECT_UNAUTHORIZED").map(|v| is_truthy(Some(&v))),
            debug: is_truthy(lookup("DEBUG").as_deref()),
        }
    }

    /// Use a different project root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Path of the generated BackstopJS configuration.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    /// Directory searched for bare URL list filenames.
    pub fn url_lists_dir(&self) -> PathBuf {
        self.root.join(URL_LISTS_DIR)
    }

    /// Directory holding raw recordings.
    pub fn recordings_dir(&self) -> PathBuf {
        self.root.join(RECORDINGS_DIR)
    }

    /// Directory receiving copied recordings and their adapters.
    pub fn recording_output_dir(&self) -> PathBuf {
        self.root.join(&self.scripts_dir).join(RECORDINGS_DIR)
    }

    /// Cookie file referenced by every scenario.
    pub fn cookie_path(&self) -> String {
        format!("{}/cookies.json", self.scripts_dir)
    }

    /// Whether TLS certificates should be verified when talking to `target`.
    ///
    /// An explicit `REJECT_UNAUTHORIZED` wins; otherwise locally addressed
    /// targets skip verification so self-signed development certificates work.
    pub fn verify_tls(&self, target: &str) -> bool {
        self.reject_unauthorized
            .unwrap_or_else(|| !is_local_domain(target))
    }

    /// Resolve a path relative to the project root.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

/// Whether the host of `url` is a development/LAN address.
pub fn is_local_domain(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_lowercase();

    host == "localhost"
        || host.ends_with(".test")
        || host.ends_with(".local")
        || host.starts_with("127.")
        || host.starts_with("192.168.")
        || host.starts_with("10.")
        || host == "0.0.0.0"
}

fn resolve_sitemap_url(site_url: &str, sitemap: Option<&str>) -> String {
    let base = site_url.trim_end_matches('/');
    match sitemap {
        Some(s) if s.starts_with("http://") || s.starts_with("https://") => s.to_string(),
        Some(s) => format!("{}/{}", base, s.trim_start_matches('/')),
        None => format!("{}/sitemap.xml", base),
    }
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
    headers.insert(
        "Accept".to_string(),
        "application/xml, text/xml, */*".to_string(),
    );
    headers
}

fn parse_headers(raw: &str) -> Result<BTreeMap<String, String>, String> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    Ok(object
        .iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect())
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, key: &str) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(value, Some("true") | Some("1"))
}
