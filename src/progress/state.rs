//! Progress bookkeeping for a BackstopJS run.

use std::time::{Duration, Instant};

use super::classifier::{BackstopClassifier, OutputClassifier, OutputEvent};

/// Counters for one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Steps seen so far, never above `total`.
    pub completed: u64,
    /// Expected steps: scenarios × viewports × 2 (capture and compare).
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub current_scenario: Option<String>,
    pub current_viewport: Option<String>,
    pub started_at: Instant,
    pub elapsed: Duration,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self {
            completed: 0,
            total,
            passed: 0,
            failed: 0,
            current_scenario: None,
            current_viewport: None,
            started_at: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }

    /// Count one finished step. Returns false once the total is reached.
    pub fn complete_step(&mut self) -> bool {
        if self.completed < self.total {
            self.completed += 1;
            true
        } else {
            false
        }
    }

    /// Refresh `elapsed` from the wall clock.
    pub fn tick(&mut self) {
        self.elapsed = self.started_at.elapsed();
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u64 {
        (self.fraction() * 100.0).round() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Remaining time extrapolated from the average step duration.
    pub fn eta(&self) -> Option<Duration> {
        if self.completed == 0 || self.is_complete() {
            return None;
        }
        let per_step = self.elapsed.as_secs_f64() / self.completed as f64;
        let remaining = (self.total - self.completed) as f64 * per_step;
        Some(Duration::from_secs_f64(remaining))
    }
}

/// Lifecycle of a monitored run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Running,
    Succeeded,
    Failed(i32),
}

/// Applies classified output to a [`ProgressState`].
pub struct ProgressMonitor<C = BackstopClassifier> {
    classifier: C,
    state: ProgressState,
    phase: Phase,
}

/// What changed after feeding a line to the monitor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    /// A step was counted.
    pub advanced: bool,
    /// A new scenario started.
    pub scenario_changed: bool,
}

impl ProgressMonitor<BackstopClassifier> {
    pub fn new(total: u64) -> Self {
        Self::with_classifier(total, BackstopClassifier)
    }
}

impl<C: OutputClassifier> ProgressMonitor<C> {
    pub fn with_classifier(total: u64, classifier: C) -> Self {
        Self {
            classifier,
            state: ProgressState::new(total),
            phase: Phase::NotStarted,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Start the clock. Has no effect once started.
    pub fn start(&mut self) {
        if self.phase == Phase::NotStarted {
            self.state.started_at = Instant::now();
            self.state.elapsed = Duration::ZERO;
            self.phase = Phase::Running;
        }
    }

    pub fn tick(&mut self) {
        if self.phase == Phase::Running {
            self.state.tick();
        }
    }

    /// Classify one cleaned output line and apply its events.
    pub fn handle_line(&mut self, line: &str) -> LineOutcome {
        let mut outcome = LineOutcome::default();
        if self.phase != Phase::Running {
            return outcome;
        }

        for event in self.classifier.classify(line) {
            match event {
                OutputEvent::ScenarioStarted(name) => {
                    if self.state.current_scenario.as_deref() != Some(name.as_str()) {
                        outcome.scenario_changed = true;
                    }
                    self.state.current_scenario = Some(name);
                }
                OutputEvent::Viewport(viewport) => {
                    self.state.current_viewport = Some(viewport);
                }
                OutputEvent::StepCompleted => {
                    // One step per line at most.
                    if !outcome.advanced && self.state.complete_step() {
                        outcome.advanced = true;
                        self.state.tick();
                    }
                }
                OutputEvent::Passed => self.state.passed += 1,
                OutputEvent::Failed => self.state.failed += 1,
            }
        }
        outcome
    }

    /// Record the exit code. A clean exit marks every step as done.
    pub fn finish(&mut self, exit_code: i32) -> Phase {
        if self.phase == Phase::Running {
            self.state.tick();
        }
        if exit_code == 0 {
            self.state.completed = self.state.total;
            self.phase = Phase::Succeeded;
        } else {
            self.phase = Phase::Failed(exit_code);
        }
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_is_clamped_to_total() {
        let mut state = ProgressState::new(2);
        assert!(state.complete_step());
        assert!(state.complete_step());
        assert!(!state.complete_step());
        assert_eq!(state.completed, 2);
        assert_eq!(state.percent(), 100);
    }

    #[test]
    fn eta_extrapolates_average_step_time() {
        let mut state = ProgressState::new(10);
        assert_eq!(state.eta(), None);

        state.completed = 4;
        state.elapsed = Duration::from_secs(8);
        assert_eq!(state.eta(), Some(Duration::from_secs(12)));

        state.completed = 10;
        assert_eq!(state.eta(), None);
    }

    #[test]
    fn monitor_ignores_output_before_start() {
        let mut monitor = ProgressMonitor::new(4);
        assert_eq!(monitor.phase(), Phase::NotStarted);
        assert!(!monitor.handle_line("Close Browser").advanced);
        assert_eq!(monitor.state().completed, 0);
    }

    #[test]
    fn monitor_counts_steps_monotonically() {
        let mut monitor = ProgressMonitor::new(3);
        monitor.start();

        let lines = [
            "SCENARIO | Homepage [1a2b3c4d]",
            "Close Browser",
            "Close Browser",
            "COMPARE bitmap captured",
            "Close Browser",
            "Close Browser",
        ];
        let mut last = 0;
        for line in lines {
            monitor.handle_line(line);
            let completed = monitor.state().completed;
            assert!(completed >= last);
            assert!(completed <= monitor.state().total);
            last = completed;
        }
        assert_eq!(monitor.state().completed, 3);
        assert_eq!(
            monitor.state().current_scenario.as_deref(),
            Some("Homepage [1a2b3c4d]")
        );
    }

    #[test]
    fn scenario_change_is_reported_once() {
        let mut monitor = ProgressMonitor::new(4);
        monitor.start();
        assert!(monitor.handle_line("SCENARIO: About").scenario_changed);
        assert!(!monitor.handle_line("SCENARIO: About").scenario_changed);
        assert!(monitor.handle_line("SCENARIO: Contact").scenario_changed);
    }

    #[test]
    fn clean_exit_completes_all_steps() {
        let mut monitor = ProgressMonitor::new(8);
        monitor.start();
        monitor.handle_line("Close Browser");
        assert_eq!(monitor.finish(0), Phase::Succeeded);
        assert_eq!(monitor.state().completed, 8);
    }

    #[test]
    fn failing_exit_keeps_counts() {
        let mut monitor = ProgressMonitor::new(8);
        monitor.start();
        monitor.handle_line("Close Browser");
        monitor.handle_line("✗ scenario About mismatch");
        assert_eq!(monitor.finish(1), Phase::Failed(1));
        assert_eq!(monitor.state().completed, 1);
        assert_eq!(monitor.state().failed, 1);
    }

    struct EveryLineIsAStep;

    impl OutputClassifier for EveryLineIsAStep {
        fn classify(&self, _line: &str) -> Vec<OutputEvent> {
            vec![OutputEvent::StepCompleted, OutputEvent::StepCompleted]
        }
    }

    #[test]
    fn custom_classifier_still_counts_one_step_per_line() {
        let mut monitor = ProgressMonitor::with_classifier(5, EveryLineIsAStep);
        monitor.start();
        monitor.handle_line("anything");
        monitor.handle_line("anything else");
        assert_eq!(monitor.state().completed, 2);
    }
}
