//! Reading and writing `backstop.json`.
//!
//! The file is treated as a loosely typed JSON object so keys added by hand
//! (custom engine options, extra report formats) survive regeneration. Only
//! `id`, `paths` and `scenarios` are owned by this tool.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::scenario::ScenarioRecord;
use crate::config::{Settings, BASE_DATA_DIR};

/// Errors for reading or writing the BackstopJS configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No scenarios to write")]
    NoScenarios,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A named browser size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default, alias = "name")]
    pub label: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(label: &str, width: u32, height: u32) -> Self {
        Self {
            label: label.to_string(),
            width,
            height,
        }
    }
}

/// Viewports written when the existing file declares none.
pub fn default_viewports() -> Vec<Viewport> {
    vec![
        Viewport::new("phone", 320, 480),
        Viewport::new("tablet", 1024, 768),
    ]
}

/// Output locations BackstopJS writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPaths {
    #[serde(default)]
    pub bitmaps_reference: Option<String>,
    #[serde(default)]
    pub bitmaps_test: Option<String>,
    #[serde(default)]
    pub engine_scripts: Option<String>,
    #[serde(default)]
    pub html_report: Option<String>,
    #[serde(default)]
    pub ci_report: Option<String>,
}

impl ConfigPaths {
    /// Paths derived from the current settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let data = &settings.data_dir;
        Self {
            bitmaps_reference: Some(format!("{}/bitmaps_reference", data)),
            bitmaps_test: Some(format!("{}/bitmaps_test", data)),
            engine_scripts: Some(settings.scripts_dir.clone()),
            html_report: Some(format!("{}/html_report", data)),
            ci_report: Some(format!("{}/ci_report", data)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSummary {
    #[serde(default)]
    pub label: String,
}

/// The parts of `backstop.json` the runner needs.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadedConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSummary>,
    #[serde(default)]
    pub viewports: Vec<Viewport>,
    #[serde(default)]
    pub paths: Option<ConfigPaths>,
}

impl LoadedConfig {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.scenarios.iter().map(|s| s.label.as_str())
    }

    /// Directory of the HTML report, falling back to the BackstopJS default.
    pub fn html_report_dir(&self) -> String {
        self.paths
            .as_ref()
            .and_then(|p| p.html_report.clone())
            .unwrap_or_else(|| format!("{}/html_report", BASE_DATA_DIR))
    }
}

fn default_config() -> Map<String, Value> {
    let value = json!({
        "viewports": default_viewports(),
        "report": ["browser"],
        "engine": "puppeteer",
        "engineOptions": { "args": ["--no-sandbox"] },
        "asyncCaptureLimit": 5,
        "asyncCompareLimit": 50,
        "debug": false,
        "debugWindow": false,
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Merge defaults, an existing configuration and fresh scenarios.
///
/// Keys from `existing` override defaults except `scenarios`, which is always
/// replaced. `id` and `paths` always come from `settings`.
pub fn build_config(
    existing: Option<Map<String, Value>>,
    scenarios: &[ScenarioRecord],
    settings: &Settings,
) -> Result<Value, ConfigError> {
    if scenarios.is_empty() {
        return Err(ConfigError::NoScenarios);
    }

    let mut config = default_config();
    if let Some(existing) = existing {
        for (key, value) in existing {
            if key != "scenarios" {
                config.insert(key, value);
            }
        }
    }

    config.insert("id".to_string(), Value::String(settings.project_id.clone()));
    config.insert(
        "paths".to_string(),
        serde_json::to_value(ConfigPaths::from_settings(settings))?,
    );
    config.insert("scenarios".to_string(), serde_json::to_value(scenarios)?);

    Ok(Value::Object(config))
}

/// Existing configuration object at `path`, if it can be read.
fn read_existing(path: &Path) -> Option<Map<String, Value>> {
    if !path.exists() {
        return None;
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()));
    match parsed {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("{} is not a JSON object, using defaults", path.display());
            None
        }
        Err(e) => {
            warn!("Could not read existing {} ({}), using defaults", path.display(), e);
            None
        }
    }
}

/// Write `backstop.json`, keeping settings a user added to an existing file.
pub fn write_config(
    path: &Path,
    scenarios: &[ScenarioRecord],
    settings: &Settings,
) -> Result<(), ConfigError> {
    let config = build_config(read_existing(path), scenarios, settings)?;
    let mut content = serde_json::to_string_pretty(&config)?;
    content.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    debug!("Wrote {} scenarios to {}", scenarios.len(), path.display());
    Ok(())
}

/// Load the configuration the runner will execute.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backstop::scenario::url_scenario;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn scenarios(urls: &[&str], settings: &Settings) -> Vec<ScenarioRecord> {
        urls.iter().map(|u| url_scenario(u, settings)).collect()
    }

    #[test]
    fn empty_scenarios_are_rejected() {
        let settings = Settings::default();
        assert!(matches!(
            build_config(None, &[], &settings),
            Err(ConfigError::NoScenarios)
        ));
    }

    #[test]
    fn defaults_are_applied() {
        let settings = Settings::default();
        let config = build_config(None, &scenarios(&["https://a.test/"], &settings), &settings)
            .unwrap();

        assert_eq!(config["id"], "backstop_default");
        assert_eq!(config["engine"], "puppeteer");
        assert_eq!(config["viewports"][0]["label"], "phone");
        assert_eq!(config["viewports"][1]["width"], 1024);
        assert_eq!(config["paths"]["html_report"], "backstop_data/html_report");
        assert_eq!(config["paths"]["engine_scripts"], "backstop_data/engine_scripts");
        assert_eq!(config["scenarios"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn existing_keys_win_but_scenarios_id_and_paths_are_replaced() {
        let env: HashMap<&str, &str> =
            [("PROJECT_ID", "shop"), ("BACKSTOP_DATA_DIR", "shop")].into();
        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        let existing = json!({
            "id": "old",
            "viewports": [{ "label": "desktop", "width": 1920, "height": 1080 }],
            "paths": { "html_report": "somewhere/else" },
            "scenarios": [{ "label": "stale" }],
            "onReadyScript": "puppet/onReady.js"
        });
        let Value::Object(existing) = existing else {
            unreachable!()
        };

        let config = build_config(
            Some(existing),
            &scenarios(&["https://a.test/about"], &settings),
            &settings,
        )
        .unwrap();

        assert_eq!(config["id"], "shop");
        assert_eq!(config["viewports"].as_array().unwrap().len(), 1);
        assert_eq!(config["onReadyScript"], "puppet/onReady.js");
        assert_eq!(config["paths"]["html_report"], "backstop_data/shop/html_report");
        assert_eq!(config["paths"]["bitmaps_test"], "backstop_data/shop/bitmaps_test");
        assert!(config["scenarios"][0]["label"]
            .as_str()
            .unwrap()
            .starts_with("About ["));
    }

    #[test]
    fn writing_twice_only_changes_scenarios() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::default().with_root(dir.path());
        let path = settings.config_path();

        write_config(&path, &scenarios(&["https://a.test/"], &settings), &settings).unwrap();
        let first: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        write_config(
            &path,
            &scenarios(&["https://a.test/x", "https://a.test/y"], &settings),
            &settings,
        )
        .unwrap();
        let second: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(first["id"], second["id"]);
        assert_eq!(first["paths"], second["paths"]);
        assert_eq!(first["viewports"], second["viewports"]);
        assert_ne!(first["scenarios"], second["scenarios"]);
        assert_eq!(second["scenarios"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn invalid_existing_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::default().with_root(dir.path());
        let path = settings.config_path();
        fs::write(&path, "{ not json").unwrap();

        write_config(&path, &scenarios(&["https://a.test/"], &settings), &settings).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.scenarios.len(), 1);
        assert_eq!(loaded.viewports, default_viewports());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backstop.json");
        assert!(matches!(load_config(&path), Err(ConfigError::NotFound(_))));

        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn html_report_falls_back_to_default_location() {
        let loaded: LoadedConfig =
            serde_json::from_str(r#"{ "scenarios": [{ "label": "A" }] }"#).unwrap();
        assert_eq!(loaded.html_report_dir(), "backstop_data/html_report");
        assert_eq!(loaded.labels().collect::<Vec<_>>(), vec!["A"]);
        assert!(loaded.viewports.is_empty());
    }
}
