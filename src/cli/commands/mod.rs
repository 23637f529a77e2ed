//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod generate;
mod reset;
mod run_cmd;

use clap::{Parser, Subcommand};

use backstopper::config::Settings;
use backstopper::progress::RunMode;

#[derive(Parser)]
#[command(name = "backstopper")]
#[command(about = "Generate and run BackstopJS visual regression suites")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Generate backstop.json from the URL list named by URL_LIST
    GenerateList,

    /// Generate backstop.json from the site's sitemap and puppet/ recordings
    GenerateSitemap,

    /// Run BackstopJS with a live progress bar
    Run {
        /// BackstopJS command
        #[arg(value_enum)]
        mode: RunMode,

        /// Only run scenarios whose label matches this pattern (case-insensitive)
        #[arg(long)]
        filter: Option<String>,

        /// Save raw BackstopJS output to backstop-debug.log
        #[arg(long)]
        debug: bool,

        /// Do not open the HTML report after `test`
        #[arg(long)]
        no_open: bool,

        /// Extra arguments passed to BackstopJS unchanged
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Delete generated screenshots, reports, recordings and backstop.json
    Reset,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::GenerateList => generate::cmd_generate_list(&settings).await,
        Commands::GenerateSitemap => generate::cmd_generate_sitemap(&settings).await,
        Commands::Run {
            mode,
            filter,
            debug,
            no_open,
            extra,
        } => run_cmd::cmd_run(&settings, mode, filter, debug, no_open, extra).await,
        Commands::Reset => reset::cmd_reset(&settings).await,
    }
}
