//! URL list to backstop.json, end to end.

use std::fs;

use backstopper::backstop::{assemble, load_config, scenario_label, write_config};
use backstopper::config::Settings;
use backstopper::progress::calculate_totals;
use backstopper::sources::{read_urls_from_file, resolve_list_path};
use tempfile::TempDir;

fn settings_in(dir: &TempDir) -> Settings {
    Settings::default().with_root(dir.path())
}

#[test]
fn list_becomes_labelled_scenarios() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let lists = settings.url_lists_dir();
    fs::create_dir_all(&lists).unwrap();
    fs::write(
        lists.join("site.txt"),
        "https://example.com/\n#comment\n\nhttps://example.com/about\n",
    )
    .unwrap();

    let path = resolve_list_path("site.txt", &lists);
    let urls = read_urls_from_file(&path).unwrap();
    assert_eq!(urls, vec!["https://example.com/", "https://example.com/about"]);

    let scenarios = assemble(&[], &urls, &settings);
    write_config(&settings.config_path(), &scenarios, &settings).unwrap();

    let config = load_config(&settings.config_path()).unwrap();
    let labels: Vec<&str> = config.labels().collect();
    assert_eq!(labels.len(), 2);
    assert!(labels[0].starts_with("Homepage ["));
    assert!(labels[1].starts_with("About ["));
    assert_eq!(labels[0], scenario_label("https://example.com/"));
    assert_ne!(labels[0], labels[1]);

    let totals = calculate_totals(&config, None).unwrap();
    assert_eq!(totals.total, 2 * 2 * 2);
}

#[test]
fn json_list_and_existing_customizations_survive_regeneration() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let list = dir.path().join("pages.json");
    fs::write(
        &list,
        r#"["https://example.com/blog", { "url": "https://example.com/contact" }]"#,
    )
    .unwrap();
    fs::write(
        settings.config_path(),
        r#"{ "viewports": [{ "label": "desktop", "width": 1440, "height": 900 }], "report": ["CI"] }"#,
    )
    .unwrap();

    let urls = read_urls_from_file(&list).unwrap();
    let scenarios = assemble(&[], &urls, &settings);
    write_config(&settings.config_path(), &scenarios, &settings).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(settings.config_path()).unwrap()).unwrap();
    assert_eq!(raw["report"][0], "CI");
    assert_eq!(raw["id"], "backstop_default");
    assert_eq!(raw["scenarios"][1]["url"], "https://example.com/contact");

    let config = load_config(&settings.config_path()).unwrap();
    assert_eq!(config.viewports.len(), 1);
    assert_eq!(calculate_totals(&config, Some("blog")).unwrap().total, 2);
}
