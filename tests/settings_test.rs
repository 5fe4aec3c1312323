use std::fs;
use std::path::Path;

use pdfcrop::settings::{SettingsStore, WindowGeometry};
use pdfcrop::test_utils::test_helpers::write_numbered_pdf;

#[test]
fn saved_settings_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pdfcrop").join("config.yaml");
    let pdf = write_numbered_pdf(&dir.path().join("report.pdf"), 4);

    let mut store = SettingsStore::load(config.clone()).unwrap();
    {
        let settings = store.settings_mut();
        settings.zoom = 1.25;
        settings.window_geometry = Some(WindowGeometry {
            x: 40.0,
            y: 60.0,
            width: 900.0,
            height: 700.0,
        });
        settings.set_language("zh-CN");
        settings.update_file_settings(&pdf, 0.4, 5);
    }
    store.save().unwrap();
    assert!(config.exists());
    assert!(!config.with_extension("yaml.tmp").exists());

    let reloaded = SettingsStore::load(config).unwrap();
    let settings = reloaded.settings();
    assert_eq!(settings.zoom, 1.25);
    assert_eq!(settings.window_geometry.map(|g| g.width), Some(900.0));
    assert_eq!(settings.language(), "zh_CN");

    let file = settings.file_settings(&pdf);
    assert_eq!(file.scroll_position, 0.4);
    assert_eq!(file.max_extract_pages, 5);
    assert!(settings.last_file().is_some());
}

#[test]
fn most_recent_file_comes_first_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");

    let mut store = SettingsStore::with_defaults(config.clone());
    let names = ["a.pdf", "b.pdf", "c.pdf"];
    for name in names {
        let pdf = write_numbered_pdf(&dir.path().join(name), 1);
        store.settings_mut().update_file_settings(&pdf, 0.0, 3);
        // Timestamps must differ for ordering to be meaningful
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
    store.save().unwrap();

    let reloaded = SettingsStore::load(config).unwrap();
    let recent: Vec<String> = reloaded
        .settings()
        .recent_files(10)
        .iter()
        .filter_map(|p| file_name(p))
        .collect();
    assert_eq!(recent, vec!["c.pdf", "b.pdf", "a.pdf"]);
}

#[test]
fn empty_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    fs::write(&config, "\n").unwrap();

    let store = SettingsStore::load(config).unwrap();
    assert!(store.settings().recent_files.is_empty());
    assert_eq!(store.settings().language(), "en_US");
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
