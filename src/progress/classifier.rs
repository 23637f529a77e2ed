//! Turning BackstopJS console output into progress events.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x1b\x{9b}][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]")
        .unwrap()
});

static SCENARIO_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)SCENARIO\s*[:|]\s*(.+)").unwrap());

static VIEWPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[(\d+x\d+|\w+)\]").unwrap());

static CAPTURE_STEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Close Browser|BackstopTools have been installed").unwrap());

static COMPARE_STEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)compare|bitmap|captured").unwrap());

static PASSED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)passed|✓|PASS").unwrap());

static FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)failed|✗|FAIL|mismatch").unwrap());

/// Something a line of runner output tells us about the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    ScenarioStarted(String),
    Viewport(String),
    /// A capture or comparison finished.
    StepCompleted,
    Passed,
    Failed,
}

/// Maps a cleaned output line to progress events.
pub trait OutputClassifier {
    fn classify(&self, line: &str) -> Vec<OutputEvent>;
}

/// Heuristics for the BackstopJS console format.
///
/// BackstopJS has no machine-readable progress output, so steps are inferred
/// from the log lines it prints around each capture and comparison.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackstopClassifier;

impl OutputClassifier for BackstopClassifier {
    fn classify(&self, line: &str) -> Vec<OutputEvent> {
        let mut events = Vec::new();

        if let Some(caps) = SCENARIO_START.captures(line) {
            let name = caps[1].trim();
            if !name.is_empty() {
                events.push(OutputEvent::ScenarioStarted(name.to_string()));
            }
        }

        if let Some(caps) = VIEWPORT.captures(line) {
            events.push(OutputEvent::Viewport(caps[1].to_string()));
        }

        if CAPTURE_STEP.is_match(line) || COMPARE_STEP.is_match(line) {
            events.push(OutputEvent::StepCompleted);
        }

        let lower = line.to_lowercase();
        let failed = FAILED.is_match(line);
        if PASSED.is_match(line)
            && !failed
            && (lower.contains("scenario") || line.contains('✓'))
        {
            events.push(OutputEvent::Passed);
        }
        if failed
            && (lower.contains("scenario") || line.contains('✗') || lower.contains("mismatch"))
        {
            events.push(OutputEvent::Failed);
        }

        events
    }
}

/// Remove terminal color and cursor escape sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Reassembles lines from arbitrarily split output chunks.
///
/// Only newline-terminated lines are released; a trailing partial line is
/// held until the next chunk or [`LineBuffer::finish`].
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk and return the complete, cleaned, non-blank lines it closed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        complete
            .split(|&b| b == b'\n')
            .filter_map(clean_line)
            .collect()
    }

    /// Flush whatever partial line remains.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        clean_line(&rest)
    }
}

fn clean_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let cleaned = strip_ansi(&text);
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(line: &str) -> Vec<OutputEvent> {
        BackstopClassifier.classify(line)
    }

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[32mCOMPARE PASSED\x1b[0m"), "COMPARE PASSED");
        assert_eq!(strip_ansi("\x1b[1;31mred\x1b[K"), "red");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn scenario_and_viewport_are_detected() {
        let events = classify("SCENARIO | About [a1b2c3d4] [phone]");
        assert_eq!(
            events[0],
            OutputEvent::ScenarioStarted("About [a1b2c3d4] [phone]".into())
        );
        assert_eq!(events[1], OutputEvent::Viewport("a1b2c3d4".into()));
    }

    #[test]
    fn capture_and_compare_lines_complete_one_step() {
        assert_eq!(classify("Close Browser"), vec![OutputEvent::StepCompleted]);
        assert_eq!(
            classify("BackstopTools have been installed."),
            vec![OutputEvent::StepCompleted]
        );
        assert_eq!(
            classify("Captured bitmap for compare"),
            vec![OutputEvent::StepCompleted]
        );
        assert!(classify("Starting Chromium").is_empty());
    }

    #[test]
    fn pass_requires_scenario_or_check_mark() {
        assert!(classify("✓ Homepage").contains(&OutputEvent::Passed));
        assert!(classify("scenario Homepage passed").contains(&OutputEvent::Passed));
        assert!(!classify("all tests passed").contains(&OutputEvent::Passed));
    }

    #[test]
    fn fail_markers_win_over_pass_markers() {
        let events = classify("COMPARE | FAIL scenario About passed threshold");
        assert!(events.contains(&OutputEvent::Failed));
        assert!(!events.contains(&OutputEvent::Passed));

        assert!(classify("Image mismatch 3.2%").contains(&OutputEvent::Failed));
        assert!(!classify("request failed").contains(&OutputEvent::Failed));
    }

    #[test]
    fn line_buffer_holds_partial_lines() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"SCENARIO | Ho").is_empty());
        assert_eq!(buffer.push(b"me\n\n  \nClose"), vec!["SCENARIO | Home"]);
        assert_eq!(buffer.push(b" Browser\r\n"), vec!["Close Browser"]);
        assert_eq!(buffer.push(b"tail"), Vec::<String>::new());
        assert_eq!(buffer.finish().as_deref(), Some("tail"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_survives_split_utf8_and_escapes() {
        let mut buffer = LineBuffer::new();
        let line = "\x1b[32m✓ ok\x1b[0m\n".as_bytes();
        let (head, tail) = line.split_at(7);
        assert!(buffer.push(head).is_empty());
        assert_eq!(buffer.push(tail), vec!["✓ ok"]);
    }
}
