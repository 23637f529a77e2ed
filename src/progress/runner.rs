//! Running BackstopJS as a child process under the progress monitor.

use std::ffi::OsStr;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use console::style;
use regex::RegexBuilder;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::classifier::LineBuffer;
use super::display::ProgressDisplay;
use super::state::{Phase, ProgressMonitor, ProgressState};
use crate::backstop::LoadedConfig;

/// Raw output is copied here with `--debug`.
pub const DEBUG_LOG: &str = "backstop-debug.log";

const TICK: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8 * 1024;

/// Errors for running BackstopJS.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid filter {pattern:?}: {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("No scenarios to run")]
    NothingToRun,
}

/// BackstopJS command to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Capture and compare against references
    Test,
    /// Capture new reference screenshots
    Reference,
    /// Promote the last test screenshots to references
    Approve,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Test => "test",
            RunMode::Reference => "reference",
            RunMode::Approve => "approve",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run is invoked.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Scenario label pattern, forwarded to BackstopJS.
    pub filter: Option<String>,
    pub debug: bool,
    /// Open the HTML report after a `test` run.
    pub open_report: bool,
    pub extra_args: Vec<String>,
}

impl RunOptions {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            filter: None,
            debug: false,
            open_report: true,
            extra_args: Vec::new(),
        }
    }

    /// Arguments passed to `npx`.
    pub fn backstop_args(&self) -> Vec<String> {
        let mut args = vec!["backstop".to_string(), self.mode.as_str().to_string()];
        if let Some(filter) = &self.filter {
            args.push(format!("--filter={}", filter));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Expected work for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTotals {
    pub scenarios: usize,
    pub viewports: usize,
    /// Capture plus compare for every scenario and viewport.
    pub total: u64,
    pub labels: Vec<String>,
}

/// Count the steps a run will take, honoring a case-insensitive label filter.
pub fn calculate_totals(
    config: &LoadedConfig,
    filter: Option<&str>,
) -> Result<TestTotals, RunError> {
    let pattern = filter
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|source| RunError::InvalidFilter {
                    pattern: p.to_string(),
                    source,
                })
        })
        .transpose()?;

    let labels: Vec<String> = config
        .labels()
        .filter(|label| pattern.as_ref().map_or(true, |re| re.is_match(label)))
        .map(String::from)
        .collect();

    let viewports = config.viewports.len();
    Ok(TestTotals {
        scenarios: labels.len(),
        viewports,
        total: (labels.len() * viewports * 2) as u64,
        labels,
    })
}

/// Final state of a monitored run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub phase: Phase,
    pub state: ProgressState,
}

/// Tee of raw child output.
pub struct DebugLog {
    file: File,
}

impl DebugLog {
    /// Create or truncate the log file.
    pub async fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::create(path).await?,
        })
    }

    async fn write(&mut self, prefix: &[u8], chunk: &[u8]) {
        let result = async {
            self.file.write_all(prefix).await?;
            self.file.write_all(chunk).await?;
            self.file.flush().await
        }
        .await;
        if let Err(e) = result {
            debug!("Debug log write failed: {}", e);
        }
    }
}

/// `npx` executable for this platform, resolved on `PATH` when possible.
pub fn npx_program() -> PathBuf {
    let name = if cfg!(windows) { "npx.cmd" } else { "npx" };
    which::which(name).unwrap_or_else(|_| PathBuf::from(name))
}

/// Run BackstopJS in `root` with a live progress bar.
pub async fn run_backstop(
    root: &Path,
    config: &LoadedConfig,
    options: &RunOptions,
) -> Result<RunOutcome, RunError> {
    let totals = calculate_totals(config, options.filter.as_deref())?;
    if totals.total == 0 {
        return Err(RunError::NothingToRun);
    }

    let debug_log = if options.debug {
        let path = root.join(DEBUG_LOG);
        match DebugLog::create(&path).await {
            Ok(log) => {
                println!(
                    "{} Debug mode: raw output goes to {}",
                    style("!").yellow(),
                    path.display()
                );
                Some(log)
            }
            Err(e) => {
                warn!("Cannot create {}: {}", path.display(), e);
                None
            }
        }
    } else {
        None
    };

    let display = ProgressDisplay::new(totals.total);
    display.header(
        options.mode.as_str(),
        totals.scenarios,
        totals.viewports,
        totals.total,
    );

    let program = npx_program();
    let args = options.backstop_args();
    info!("Running {} {}", program.display(), args.join(" "));

    let outcome = monitor_process(&program, &args, root, totals.total, debug_log, &display).await?;
    display.summary(&outcome.state, outcome.phase);

    if options.mode == RunMode::Test && options.open_report {
        let report = root.join(config.html_report_dir()).join("index.html");
        println!("{} Opening report: {}", style("→").cyan(), report.display());
        if let Err(e) = open_report(&report).await {
            println!(
                "{} Could not open the report automatically: {}",
                style("!").yellow(),
                e
            );
            println!("  Open it manually: {}", report.display());
        }
    }

    Ok(outcome)
}

/// Spawn `program` and feed its output through a [`ProgressMonitor`] until
/// it exits.
///
/// Both pipes are drained before the exit status is collected so trailing
/// output is never lost.
pub async fn monitor_process(
    program: impl AsRef<OsStr>,
    args: &[String],
    cwd: &Path,
    total: u64,
    mut debug_log: Option<DebugLog>,
    display: &ProgressDisplay,
) -> Result<RunOutcome, RunError> {
    let program = program.as_ref();
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

    let mut monitor = ProgressMonitor::new(total);
    monitor.start();
    display.update(monitor.state());

    let mut out_lines = LineBuffer::new();
    let mut err_lines = LineBuffer::new();
    let mut out_chunk = vec![0u8; READ_CHUNK];
    let mut err_chunk = vec![0u8; READ_CHUNK];
    let mut out_open = true;
    let mut err_open = true;

    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let status = loop {
        tokio::select! {
            read = stdout.read(&mut out_chunk), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => {
                    if let Some(log) = debug_log.as_mut() {
                        log.write(b"", &out_chunk[..n]).await;
                    }
                    for line in out_lines.push(&out_chunk[..n]) {
                        handle_stdout_line(&mut monitor, display, &line);
                    }
                }
                Err(e) => {
                    warn!("Reading runner stdout failed: {}", e);
                    out_open = false;
                }
            },
            read = stderr.read(&mut err_chunk), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => {
                    if let Some(log) = debug_log.as_mut() {
                        log.write(b"[STDERR] ", &err_chunk[..n]).await;
                    }
                    for line in err_lines.push(&err_chunk[..n]) {
                        handle_stderr_line(display, &line);
                    }
                }
                Err(e) => {
                    warn!("Reading runner stderr failed: {}", e);
                    err_open = false;
                }
            },
            _ = ticker.tick() => {
                monitor.tick();
                display.update(monitor.state());
            }
            status = child.wait(), if !out_open && !err_open => break status?,
        }
    };

    if let Some(line) = out_lines.finish() {
        handle_stdout_line(&mut monitor, display, &line);
    }
    if let Some(line) = err_lines.finish() {
        handle_stderr_line(display, &line);
    }

    // Killed by a signal when there is no code.
    let exit_code = status.code().unwrap_or(1);
    let phase = monitor.finish(exit_code);
    debug!("Runner exited with {} ({:?})", exit_code, phase);

    Ok(RunOutcome {
        exit_code,
        phase,
        state: monitor.state().clone(),
    })
}

fn handle_stdout_line(monitor: &mut ProgressMonitor, display: &ProgressDisplay, line: &str) {
    debug!(target: "backstopper::runner", "{}", line);
    let outcome = monitor.handle_line(line);
    if outcome.scenario_changed {
        display.scenario(monitor.state());
    }
    if outcome.advanced {
        display.update(monitor.state());
    }
}

/// Whether a stderr line deserves the user's attention.
pub fn is_reportable_error(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error") && !lower.contains("mismatch")
}

fn handle_stderr_line(display: &ProgressDisplay, line: &str) {
    if is_reportable_error(line) {
        display.error(line);
    } else {
        debug!(target: "backstopper::runner", "stderr: {}", line);
    }
}

/// Open `path` with the desktop's default handler.
pub async fn open_report(path: &Path) -> io::Result<()> {
    let mut command = if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(path);
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(path);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    };

    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("opener exited with {}", status)))
    }
}
