//! Live progress for BackstopJS runs.
//!
//! BackstopJS only prints human-oriented logs, so the runner reads the child's
//! output as it arrives, classifies each line and advances a bar of
//! `scenarios × viewports × 2` steps (one capture and one comparison each).

pub mod classifier;
pub mod display;
pub mod runner;
pub mod state;

pub use classifier::{strip_ansi, BackstopClassifier, LineBuffer, OutputClassifier, OutputEvent};
pub use display::{format_time, ProgressDisplay};
pub use runner::{
    calculate_totals, monitor_process, run_backstop, RunError, RunMode, RunOptions, RunOutcome,
    TestTotals,
};
pub use state::{Phase, ProgressMonitor, ProgressState};
