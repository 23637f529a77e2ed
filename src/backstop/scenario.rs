//! Scenario records and their labels.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Settings;
use crate::recording::{RecordingInfo, BLANK_URL};

/// Longest readable part of a label, before the hash suffix.
pub const MAX_LABEL_CHARS: usize = 60;

/// Characters not allowed in label-derived file names on common platforms.
const FORBIDDEN_LABEL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Default delay before capturing a page scenario.
pub const PAGE_DELAY_MS: u64 = 5000;

pub const MISMATCH_THRESHOLD: f64 = 0.1;

/// One entry of the `scenarios` array in `backstop.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    pub label: String,
    pub cookie_path: String,
    pub url: String,
    pub reference_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_event: Option<String>,
    pub ready_selector: String,
    pub delay: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_interaction_wait: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_selectors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_selectors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_selector: Option<String>,
    pub selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_expansion: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<u32>,
    pub mis_match_threshold: f64,
    pub require_same_dimensions: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_before_script: Option<String>,
}

/// Readable label for a page URL, built from its path segments.
///
/// `https://example.com/about-us/team` becomes `About Us - Team`; the site
/// root becomes `Homepage`. Unparseable URLs are returned as-is.
pub fn generate_label(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return url.to_string();
    };

    let path = parsed.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.is_empty() {
        return "Homepage".to_string();
    }

    path.split('/')
        .map(|segment| {
            segment
                .split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" - ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// First eight hex digits of the SHA-256 of `url`.
pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..4])
}

/// Unique, filesystem-safe scenario label: `<readable> [<hash>]`.
pub fn scenario_label(url: &str) -> String {
    let cleaned: String = generate_label(url)
        .chars()
        .filter(|c| !FORBIDDEN_LABEL_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();

    let readable = if cleaned.chars().count() > MAX_LABEL_CHARS {
        cleaned
            .chars()
            .take(MAX_LABEL_CHARS)
            .collect::<String>()
            .trim()
            .to_string()
    } else {
        cleaned.to_string()
    };

    format!("{} [{}]", readable, url_hash(url))
}

/// Scenario capturing a plain page.
pub fn url_scenario(url: &str, settings: &Settings) -> ScenarioRecord {
    ScenarioRecord {
        label: scenario_label(url),
        cookie_path: settings.cookie_path(),
        url: url.to_string(),
        reference_url: String::new(),
        ready_event: None,
        ready_selector: "body".to_string(),
        delay: PAGE_DELAY_MS,
        post_interaction_wait: None,
        hide_selectors: None,
        remove_selectors: None,
        hover_selector: None,
        click_selector: None,
        selectors: Vec::new(),
        selector_expansion: None,
        expect: None,
        mis_match_threshold: MISMATCH_THRESHOLD,
        require_same_dimensions: true,
        on_before_script: None,
    }
}

/// Scenario replaying a recording before capture.
///
/// The recording navigates on its own, so the scenario URL is blank.
pub fn recording_scenario(recording: &RecordingInfo, settings: &Settings) -> ScenarioRecord {
    ScenarioRecord {
        label: recording.label.clone(),
        cookie_path: settings.cookie_path(),
        url: BLANK_URL.to_string(),
        reference_url: String::new(),
        ready_event: Some(String::new()),
        ready_selector: String::new(),
        delay: 0,
        post_interaction_wait: Some(0),
        hide_selectors: Some(Vec::new()),
        remove_selectors: Some(Vec::new()),
        hover_selector: Some(String::new()),
        click_selector: Some(String::new()),
        selectors: Vec::new(),
        selector_expansion: Some(true),
        expect: Some(0),
        mis_match_threshold: MISMATCH_THRESHOLD,
        require_same_dimensions: true,
        on_before_script: Some(recording.wrapper_path.clone()),
    }
}

/// All scenarios for a run: recordings first, then pages, each in input order.
///
/// Recordings whose labels collide (`a_b.js` and `a b.js`) get the hash of
/// their script file appended, as page labels do.
pub fn assemble(
    recordings: &[RecordingInfo],
    urls: &[String],
    settings: &Settings,
) -> Vec<ScenarioRecord> {
    let mut seen = HashSet::new();
    let mut scenarios = Vec::with_capacity(recordings.len() + urls.len());

    for recording in recordings {
        let mut scenario = recording_scenario(recording, settings);
        if !seen.insert(scenario.label.clone()) {
            scenario.label = format!(
                "{} [{}]",
                scenario.label,
                url_hash(&recording.script_file)
            );
            seen.insert(scenario.label.clone());
        }
        scenarios.push(scenario);
    }

    scenarios.extend(urls.iter().map(|u| url_scenario(u, settings)));
    scenarios
}
