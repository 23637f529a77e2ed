//! Terminal rendering of run progress.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::state::{Phase, ProgressState};

const MAX_SCENARIO_CHARS: usize = 50;

/// Format a duration as `mm:ss`.
pub fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Shorten long scenario names for the status line.
pub fn short_name(name: &str) -> String {
    if name.chars().count() > MAX_SCENARIO_CHARS {
        let head: String = name.chars().take(MAX_SCENARIO_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

fn status_message(state: &ProgressState) -> String {
    let eta = state
        .eta()
        .map(format_time)
        .unwrap_or_else(|| "--:--".to_string());
    format!(
        "{}% | ⏱ {} | ETA: {}",
        state.percent(),
        format_time(state.elapsed),
        eta
    )
}

/// Where lines printed around the bar end up.
enum Output {
    Stdout,
    Captured(Arc<Mutex<Vec<String>>>),
}

/// Progress bar plus the header and summary around it.
pub struct ProgressDisplay {
    bar: ProgressBar,
    output: Output,
}

impl ProgressDisplay {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap()
                .progress_chars("█▓░"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            output: Output::Stdout,
        }
    }

    /// A display without a bar. Text lines are still printed.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            output: Output::Stdout,
        }
    }

    /// A display without a bar that collects its text lines.
    pub fn captured() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let display = Self {
            bar: ProgressBar::hidden(),
            output: Output::Captured(Arc::clone(&lines)),
        };
        (display, lines)
    }

    /// Print above the bar without tearing it.
    ///
    /// `ProgressBar::println` drops text when the draw target is hidden (no
    /// terminal), so lines are written directly in that case.
    pub fn println(&self, message: impl AsRef<str>) {
        let line = message.as_ref();
        match &self.output {
            Output::Captured(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line.to_string());
                }
            }
            Output::Stdout if self.bar.is_hidden() => println!("{}", line),
            Output::Stdout => self.bar.suspend(|| println!("{}", line)),
        }
    }

    pub fn header(&self, mode: &str, scenarios: usize, viewports: usize, total: u64) {
        self.println(format!(
            "{} BackstopJS {}",
            style("→").cyan(),
            style(mode).yellow().bold()
        ));
        self.println(format!(
            "  Scenarios: {} | Viewports: {} | Steps: {}",
            style(scenarios).green(),
            style(viewports).green(),
            style(total).green()
        ));
    }

    pub fn update(&self, state: &ProgressState) {
        self.bar.set_length(state.total);
        self.bar.set_position(state.completed);
        self.bar.set_message(status_message(state));
    }

    pub fn scenario(&self, state: &ProgressState) {
        if let Some(name) = &state.current_scenario {
            let viewport = state.current_viewport.as_deref().unwrap_or("-");
            self.println(
                style(format!("→ {} [{}]", short_name(name), viewport))
                    .dim()
                    .to_string(),
            );
        }
    }

    pub fn error(&self, message: &str) {
        self.println(format!("{} Error: {}", style("✗").red(), message));
        if message.contains("ENOENT") {
            self.println(format!(
                "{} ENOENT usually means a file path got too long (common on Windows).",
                style("!").yellow()
            ));
            self.println(
                "  Shorten scenario labels in backstop.json or move the project to a shorter path.",
            );
        }
    }

    /// Stop the bar and print the final tally.
    pub fn summary(&self, state: &ProgressState, phase: Phase) {
        self.update(state);
        self.bar.finish_and_clear();

        let status = match phase {
            Phase::Succeeded => format!("{} {}", style("✓").green(), style("Completed").green()),
            Phase::Failed(code) => format!(
                "{} {}",
                style("✗").red(),
                style(format!("Failed (exit code {})", code)).red()
            ),
            Phase::Running | Phase::NotStarted => format!("{} Interrupted", style("!").yellow()),
        };

        self.println("");
        self.println(status);
        self.println(format!(
            "  Steps: {} of {}",
            style(state.completed).green(),
            style(state.total).dim()
        ));
        self.println(format!(
            "  Time: {}",
            style(format_time(state.elapsed)).yellow()
        ));
        if state.passed > 0 || state.failed > 0 {
            self.println(format!(
                "  Passed: {} | Failed: {}",
                style(state.passed).green(),
                style(state.failed).red()
            ));
        }
    }
}
