//! URL list readers.
//!
//! A list is either a `.txt` file with one URL per line or a `.json` array
//! of strings or `{ "url": ... }` objects.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Error type for URL list loading.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("URL list not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported list format: {0:?}. Use .txt or .json")]
    UnsupportedListFormat(String),

    #[error("Failed to read URL list: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON URL list: {0}")]
    InvalidJson(String),

    #[error("No URLs found in {}", .0.display())]
    EmptyUrlList(PathBuf),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonListItem {
    Plain(String),
    Object { url: String },
}

/// Resolve the `URL_LIST` value to a concrete path.
///
/// Absolute paths are used as-is, paths containing a separator are resolved
/// against the current directory, and bare filenames are looked up in
/// `lists_dir`.
pub fn resolve_list_path(value: &str, lists_dir: &Path) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else if value.contains('/') || value.contains(std::path::MAIN_SEPARATOR) {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    } else {
        lists_dir.join(value)
    }
}

/// Read URLs from a `.txt` or `.json` list, failing if none are found.
pub fn read_urls_from_file(path: &Path) -> Result<Vec<String>, ListError> {
    if !path.exists() {
        return Err(ListError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let content = match extension.as_str() {
        "txt" | "json" => fs::read_to_string(path)?,
        other => return Err(ListError::UnsupportedListFormat(format!(".{}", other))),
    };

    let urls = if extension == "txt" {
        parse_txt_list(&content)
    } else {
        parse_json_list(&content)?
    };

    debug!("Read {} URLs from {}", urls.len(), path.display());

    if urls.is_empty() {
        return Err(ListError::EmptyUrlList(path.to_path_buf()));
    }
    Ok(urls)
}

/// Parse a plain text list, dropping blank lines and `#` comments.
pub fn parse_txt_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.find('#') {
            Some(idx) if idx > 0 => line[..idx].trim(),
            _ => line,
        })
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a JSON list of strings or `{ "url": ... }` objects.
pub fn parse_json_list(content: &str) -> Result<Vec<String>, ListError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| ListError::InvalidJson(e.to_string()))?;

    if !value.is_array() {
        return Err(ListError::InvalidJson(
            "the file must contain an array".to_string(),
        ));
    }

    let items: Vec<JsonListItem> = serde_json::from_value(value).map_err(|_| {
        ListError::InvalidJson(
            "expected an array of strings or objects with a \"url\" property".to_string(),
        )
    })?;

    Ok(items
        .into_iter()
        .map(|item| match item {
            JsonListItem::Plain(url) => url,
            JsonListItem::Object { url } => url,
        })
        .collect())
}
