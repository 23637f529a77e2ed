//! Run command.

use console::style;

use backstopper::backstop::load_config;
use backstopper::config::Settings;
use backstopper::progress::{run_backstop, RunError, RunMode, RunOptions};

/// Run BackstopJS and exit with its status code.
pub async fn cmd_run(
    settings: &Settings,
    mode: RunMode,
    filter: Option<String>,
    debug: bool,
    no_open: bool,
    extra_args: Vec<String>,
) -> anyhow::Result<()> {
    let config_path = settings.config_path();
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            eprintln!("  Generate one first: backstopper generate-sitemap");
            std::process::exit(1);
        }
    };

    let options = RunOptions {
        mode,
        filter,
        debug,
        open_report: !no_open,
        extra_args,
    };

    match run_backstop(&settings.root, &config, &options).await {
        Ok(outcome) => {
            if outcome.exit_code != 0 {
                std::process::exit(outcome.exit_code);
            }
            Ok(())
        }
        Err(RunError::NothingToRun) => {
            eprintln!("{} No scenarios to run", style("✗").red());
            if let Some(filter) = &options.filter {
                eprintln!("  Nothing matched --filter={}", filter);
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            std::process::exit(1);
        }
    }
}
