//! Puppeteer recordings turned into BackstopJS scenarios.

pub mod adapter;

pub use adapter::{adapt, first_goto_url, AdaptedRecording};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{Settings, RECORDINGS_DIR};

/// URL reported for recordings that never navigate.
pub const BLANK_URL: &str = "about:blank";

static JS_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.js$").unwrap());

static RECORDING_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Recording\s+").unwrap());

/// A recording copied into the engine scripts directory together with its
/// adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingInfo {
    pub label: String,
    /// First URL the recording navigates to.
    pub url: String,
    pub script_file: String,
    /// Adapter path relative to the engine scripts directory.
    pub wrapper_path: String,
    /// Copied original relative to the engine scripts directory.
    pub original_path: String,
    /// The adapter only replays the first navigation.
    pub fallback: bool,
}

/// Copy every recording from `puppet/` next to the engine scripts and write
/// an adapter for each one.
///
/// Files are handled in name order. A file that cannot be read or written is
/// skipped with a warning, and a missing directory yields no recordings.
pub fn collect_recordings(settings: &Settings) -> Vec<RecordingInfo> {
    let source_dir = settings.recordings_dir();
    if !source_dir.is_dir() {
        debug!("No recordings directory at {}", source_dir.display());
        return Vec::new();
    }

    let files = match list_scripts(&source_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!("Cannot read {}: {}", source_dir.display(), e);
            return Vec::new();
        }
    };

    let output_dir = settings.recording_output_dir();
    if let Err(e) = fs::create_dir_all(&output_dir) {
        warn!("Cannot create {}: {}", output_dir.display(), e);
        return Vec::new();
    }

    let mut recordings = Vec::with_capacity(files.len());
    for file in files {
        match install_recording(&source_dir, &output_dir, &file) {
            Ok(info) => {
                if info.fallback {
                    warn!(
                        "{} could not be rewritten; only its first navigation will be replayed",
                        file
                    );
                }
                info!("Installed recording {} as {}", file, info.wrapper_path);
                recordings.push(info);
            }
            Err(e) => warn!("Skipping recording {}: {}", file, e),
        }
    }
    recordings
}

/// Human-readable label for a recording file name.
pub fn recording_label(file_name: &str) -> String {
    let stem = JS_SUFFIX.replace(file_name, "");
    RECORDING_PREFIX
        .replacen(&stem, 1, "Recording: ")
        .replace('_', " ")
}

fn list_scripts(dir: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".js") && !name.starts_with("wrapper_") {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

fn install_recording(
    source_dir: &Path,
    output_dir: &Path,
    file: &str,
) -> io::Result<RecordingInfo> {
    let source_path = source_dir.join(file);
    let script = fs::read_to_string(&source_path)?;

    let copied: PathBuf = output_dir.join(file);
    fs::copy(&source_path, &copied)?;

    let adapted = adapt(&script);
    fs::write(output_dir.join(format!("wrapper_{}", file)), &adapted.source)?;

    Ok(RecordingInfo {
        label: recording_label(file),
        url: first_goto_url(&script).unwrap_or_else(|| BLANK_URL.to_string()),
        script_file: file.to_string(),
        wrapper_path: format!("{}/wrapper_{}", RECORDINGS_DIR, file),
        original_path: format!("{}/{}", RECORDINGS_DIR, file),
        fallback: adapted.fallback,
    })
}
