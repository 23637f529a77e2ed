//! Reset command.

use console::style;

use backstopper::backstop::reset;
use backstopper::config::Settings;

/// Delete generated artifacts.
pub async fn cmd_reset(settings: &Settings) -> anyhow::Result<()> {
    println!("{} Resetting BackstopJS artifacts", style("→").cyan());

    let report = reset(settings)?;
    for path in &report.removed {
        println!("  {} Removed {}", style("✓").green(), path);
    }
    for path in &report.absent {
        println!("  {} {} (not present)", style("·").dim(), path);
    }

    println!("{} Project is clean", style("✓").green());
    Ok(())
}
