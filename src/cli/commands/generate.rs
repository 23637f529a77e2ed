//! Scenario generation commands.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use backstopper::backstop::{assemble, write_config, ConfigError, ScenarioRecord};
use backstopper::config::{Settings, URL_LISTS_DIR};
use backstopper::discovery::{dedup_preserving_order, discover_urls};
use backstopper::recording::collect_recordings;
use backstopper::sources::{read_urls_from_file, resolve_list_path, ListError};

/// Generate backstop.json from a URL list file.
pub async fn cmd_generate_list(settings: &Settings) -> anyhow::Result<()> {
    let Some(list) = settings.url_list.as_deref() else {
        eprintln!("{} URL_LIST is not set", style("✗").red());
        eprintln!("  Usage: URL_LIST=urls.txt backstopper generate-list");
        eprintln!("  .txt  one URL per line, lines starting with # are ignored");
        eprintln!("  .json array of strings or of objects with a \"url\" field");
        eprintln!("  Bare file names are looked up in {}/", URL_LISTS_DIR);
        std::process::exit(1);
    };

    let path = resolve_list_path(list, &settings.url_lists_dir());
    println!("{} Reading URLs from {}", style("→").cyan(), path.display());

    let urls = match read_urls_from_file(&path) {
        Ok(urls) => urls,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            if matches!(e, ListError::NotFound(_)) && !list.contains('/') {
                eprintln!(
                    "  Put the file in {}/ or pass a path: URL_LIST=path/to/urls.txt",
                    URL_LISTS_DIR
                );
            }
            std::process::exit(1);
        }
    };

    let found = urls.len();
    let urls = dedup_preserving_order(urls);
    if urls.len() < found {
        println!(
            "{} Dropped {} duplicate URL(s)",
            style("!").yellow(),
            found - urls.len()
        );
    }

    println!("{} Found {} URL(s)", style("✓").green(), urls.len());
    for (i, url) in urls.iter().enumerate() {
        println!("  {}. {}", i + 1, url);
    }

    let scenarios = assemble(&[], &urls, settings);
    save_scenarios(settings, &scenarios)?;
    print_next_steps();
    Ok(())
}

/// Generate backstop.json from the sitemap plus any recordings.
pub async fn cmd_generate_sitemap(settings: &Settings) -> anyhow::Result<()> {
    println!("{} Site: {}", style("→").cyan(), settings.site_url);
    if settings.sitemap_enabled {
        println!("{} Sitemap: {}", style("→").cyan(), settings.sitemap_url);
    }

    let recordings = if settings.recordings_enabled {
        collect_recordings(settings)
    } else {
        Vec::new()
    };
    if recordings.is_empty() {
        println!("  No recordings found in puppet/");
    } else {
        println!(
            "{} Found {} recording(s)",
            style("✓").green(),
            recordings.len()
        );
        for recording in &recordings {
            let note = if recording.fallback {
                format!(" {}", style("(navigation only)").yellow())
            } else {
                String::new()
            };
            println!("  - {} → {}{}", recording.label, recording.url, note);
        }
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Discovering URLs...");
    let discovered = discover_urls(settings).await;
    pb.finish_and_clear();

    let urls = match discovered {
        Ok(urls) => urls,
        Err(e) => {
            println!("{} Sitemap discovery failed: {}", style("!").yellow(), e);
            println!("  Continuing with recordings only");
            Vec::new()
        }
    };
    if urls.is_empty() {
        println!("{} No URLs found in the sitemap", style("!").yellow());
    } else {
        println!("{} Found {} URL(s)", style("✓").green(), urls.len());
    }

    let scenarios = assemble(&recordings, &urls, settings);
    if !scenarios.is_empty() {
        println!(
            "  {} scenario(s): {} from recordings, {} from the sitemap",
            scenarios.len(),
            recordings.len(),
            urls.len()
        );
    }
    save_scenarios(settings, &scenarios)?;
    print_next_steps();
    Ok(())
}

fn save_scenarios(settings: &Settings, scenarios: &[ScenarioRecord]) -> anyhow::Result<()> {
    let path = settings.config_path();
    match write_config(&path, scenarios, settings) {
        Ok(()) => {
            println!(
                "{} Wrote {} scenario(s) to {}",
                style("✓").green(),
                scenarios.len(),
                path.display()
            );
            Ok(())
        }
        Err(ConfigError::NoScenarios) => {
            eprintln!(
                "{} No scenarios found (no recordings and no URLs)",
                style("✗").red()
            );
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn next_steps() -> Vec<String> {
    vec![
        "Next:".to_string(),
        "  backstopper run reference   # first time: capture references".to_string(),
        "  backstopper run test        # compare against references".to_string(),
        format!(
            "  {} Page labels end in a SHA-256 URL hash. References captured with MD5-based",
            style("!").yellow()
        ),
        "    labels from other BackstopJS generators will not match; capture them again."
            .to_string(),
    ]
}

fn print_next_steps() {
    println!();
    for line in next_steps() {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_steps_mention_reference_capture_and_label_hash() {
        let text = console::strip_ansi_codes(&next_steps().join("\n")).into_owned();
        assert!(text.contains("backstopper run reference"));
        assert!(text.contains("SHA-256 URL hash"));
        assert!(text.contains("capture them again"));
    }
}
