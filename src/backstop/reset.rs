//! Removal of generated BackstopJS artifacts.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::config::{Settings, BASE_DATA_DIR, CONFIG_FILENAME, RECORDINGS_DIR};

const OUTPUT_DIRS: [&str; 4] = ["bitmaps_reference", "bitmaps_test", "html_report", "ci_report"];

/// What a reset removed and what was already gone.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResetReport {
    pub removed: Vec<String>,
    pub absent: Vec<String>,
}

/// Paths a reset deletes, relative to the project root, without duplicates.
pub fn reset_targets(settings: &Settings) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    let mut push = |target: String| {
        if !targets.contains(&target) {
            targets.push(target);
        }
    };

    for dir in OUTPUT_DIRS {
        push(format!("{}/{}", settings.data_dir, dir));
    }
    for dir in OUTPUT_DIRS {
        push(format!("{}/{}", BASE_DATA_DIR, dir));
    }
    push(format!("{}/{}", settings.scripts_dir, RECORDINGS_DIR));
    push(CONFIG_FILENAME.to_string());
    push(RECORDINGS_DIR.to_string());
    targets
}

/// Delete screenshots, reports, installed recordings, the generated
/// configuration and the raw recordings.
///
/// Missing paths are reported in [`ResetReport::absent`], not treated as
/// errors.
pub fn reset(settings: &Settings) -> io::Result<ResetReport> {
    let mut report = ResetReport::default();
    for target in reset_targets(settings) {
        let path = settings.resolve(&target);
        if remove_path(&path)? {
            debug!("Removed {}", path.display());
            report.removed.push(target);
        } else {
            report.absent.push(target);
        }
    }
    Ok(report)
}

fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}
