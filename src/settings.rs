use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_LANGUAGE, DEFAULT_MAX_EXTRACT_PAGES, RECENT_FILES_LIMIT, SUPPORTED_LANGUAGES,
};

pub const CURRENT_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// What is remembered about one opened file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSettings {
    /// Fraction of the scrollable height, 0.0 at the top
    #[serde(default)]
    pub scroll_position: f32,

    #[serde(default = "default_max_extract_pages")]
    pub max_extract_pages: usize,

    #[serde(default = "Utc::now")]
    pub last_accessed: DateTime<Utc>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            scroll_position: 0.0,
            max_extract_pages: DEFAULT_MAX_EXTRACT_PAGES,
            last_accessed: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_geometry: Option<WindowGeometry>,

    #[serde(default = "default_zoom")]
    pub zoom: f32,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_file: Option<String>,

    /// Keyed by normalized path
    #[serde(default)]
    pub recent_files: BTreeMap<String, FileSettings>,
}

fn default_version() -> u32 {
    // Files without a version predate versioning
    1
}

fn default_zoom() -> f32 {
    crate::pdf::DEFAULT_ZOOM
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_max_extract_pages() -> usize {
    DEFAULT_MAX_EXTRACT_PAGES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            window_geometry: None,
            zoom: default_zoom(),
            language: default_language(),
            last_file: None,
            recent_files: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Stored state for `path`, or defaults if it was never opened
    #[must_use]
    pub fn file_settings(&self, path: &Path) -> FileSettings {
        self.recent_files
            .get(&normalize_path(path))
            .cloned()
            .unwrap_or_default()
    }

    /// Remember scroll position and export window for `path` and make it
    /// the most recent file
    pub fn update_file_settings(
        &mut self,
        path: &Path,
        scroll_position: f32,
        max_extract_pages: usize,
    ) {
        let key = normalize_path(path);
        let scroll_position = if scroll_position.is_finite() {
            scroll_position.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.recent_files.insert(
            key.clone(),
            FileSettings {
                scroll_position,
                max_extract_pages: max_extract_pages.max(1),
                last_accessed: Utc::now(),
            },
        );
        self.last_file = Some(key);
        self.prune_recent();
    }

    /// Most recently used PDFs, newest first
    #[must_use]
    pub fn recent_files(&self, limit: usize) -> Vec<PathBuf> {
        let mut entries: Vec<(&String, &FileSettings)> = self
            .recent_files
            .iter()
            .filter(|(path, _)| is_pdf_path(path))
            .collect();
        entries.sort_by(|a, b| b.1.last_accessed.cmp(&a.1.last_accessed).then(a.0.cmp(b.0)));
        entries
            .into_iter()
            .take(limit)
            .map(|(path, _)| PathBuf::from(path))
            .collect()
    }

    pub fn remove_recent(&mut self, path: &Path) -> bool {
        let key = normalize_path(path);
        let removed = self.recent_files.remove(&key).is_some();
        if self.last_file.as_deref() == Some(key.as_str()) {
            self.last_file = None;
        }
        removed
    }

    pub fn clear_recent(&mut self) {
        self.recent_files.clear();
        self.last_file = None;
    }

    /// Forget files that no longer exist. Returns how many were dropped.
    pub fn cleanup_missing(&mut self) -> usize {
        let before = self.recent_files.len();
        self.recent_files.retain(|path, _| Path::new(path).exists());
        if let Some(last) = &self.last_file {
            if !self.recent_files.contains_key(last) {
                self.last_file = None;
            }
        }
        let removed = before - self.recent_files.len();
        if removed > 0 {
            info!("Dropped {removed} missing files from recent list");
        }
        removed
    }

    #[must_use]
    pub fn last_file(&self) -> Option<PathBuf> {
        self.last_file.as_ref().map(PathBuf::from)
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, code: &str) {
        self.language = normalize_language(code);
    }

    fn prune_recent(&mut self) {
        while self.recent_files.len() > RECENT_FILES_LIMIT {
            let oldest = self
                .recent_files
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(path, _)| path.clone());
            match oldest {
                Some(path) => {
                    self.recent_files.remove(&path);
                }
                None => break,
            }
        }
    }
}

/// Settings bound to the file they are persisted in
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Defaults that will be saved to `path`
    #[must_use]
    pub fn with_defaults(path: PathBuf) -> Self {
        Self {
            path,
            settings: Settings::default(),
        }
    }

    /// Load from `path`. A missing file yields defaults; nothing is written
    /// until [`Self::save`].
    pub fn load(path: PathBuf) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Settings file not found, using defaults for {}", path.display());
                return Ok(Self::with_defaults(path));
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };

        let mut settings = if content.trim().is_empty() {
            Settings::default()
        } else {
            match serde_yaml::from_str::<Settings>(&content) {
                Ok(settings) => settings,
                Err(source) => return Err(SettingsError::Parse { path, source }),
            }
        };
        debug!("Loaded settings from {}", path.display());

        settings.language = normalize_language(&settings.language);
        let needs_migration = settings.version < CURRENT_VERSION;
        if needs_migration {
            migrate_settings(&mut settings);
        }

        let store = Self { path, settings };
        if needs_migration {
            // The migrated values are used even if they cannot be written back
            store.save_or_warn();
        }
        Ok(store)
    }

    /// Write settings, creating parent directories as needed
    pub fn save(&self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut content = String::from(SETTINGS_HEADER);
        content.push_str(&serde_yaml::to_string(&self.settings)?);

        // Write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, content).map_err(|source| SettingsError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!("Saved settings to {}", self.path.display());
        Ok(())
    }

    /// Save, logging instead of failing
    pub fn save_or_warn(&self) {
        if let Err(e) = self.save() {
            warn!("{e}");
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

const SETTINGS_HEADER: &str =
    "# pdfcrop settings. Edited by the application; comments are not preserved.\n";

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    if settings.version < 2 {
        // v1 keyed recent files by the path as typed
        let entries = std::mem::take(&mut settings.recent_files);
        for (path, entry) in entries {
            let key = normalize_path(Path::new(&path));
            match settings.recent_files.get(&key) {
                Some(existing) if existing.last_accessed >= entry.last_accessed => {}
                _ => {
                    settings.recent_files.insert(key, entry);
                }
            }
        }
        settings.last_file = settings
            .last_file
            .take()
            .map(|last| normalize_path(Path::new(&last)));
    }

    settings.version = CURRENT_VERSION;
}

/// Absolute, canonical when the file exists, always with forward slashes
#[must_use]
pub fn normalize_path(path: &Path) -> String {
    let resolved = fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().replace('\\', "/");
    // canonicalize on Windows yields verbatim paths
    text.strip_prefix("//?/").map(str::to_string).unwrap_or(text)
}

/// Map a language code onto one of the supported ones
#[must_use]
pub fn normalize_language(code: &str) -> String {
    let wanted = code.trim().replace('-', "_");
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| lang.eq_ignore_ascii_case(&wanted))
        .map_or_else(default_language, |lang| (*lang).to_string())
}

fn is_pdf_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unknown_file_gets_defaults() {
        let settings = Settings::default();
        let file = settings.file_settings(Path::new("/nowhere/a.pdf"));
        assert_eq!(file.max_extract_pages, 3);
        assert_eq!(file.scroll_position, 0.0);
    }

    #[test]
    fn update_sets_last_file_and_clamps() {
        let mut settings = Settings::default();
        settings.update_file_settings(Path::new("/docs/a.pdf"), 1.7, 0);

        let file = settings.file_settings(Path::new("/docs/a.pdf"));
        assert_eq!(file.scroll_position, 1.0);
        assert_eq!(file.max_extract_pages, 1);
        let expected = PathBuf::from(normalize_path(Path::new("/docs/a.pdf")));
        assert_eq!(settings.last_file(), Some(expected));
    }

    #[test]
    fn recent_files_only_pdfs_newest_first() {
        let mut settings = Settings::default();
        let now = Utc::now();
        let names = ["/d/old.pdf", "/d/notes.txt", "/d/new.PDF", "/d/mid.pdf"];
        for (i, name) in names.iter().enumerate() {
            let age = match i {
                0 => 30,
                1 => 0,
                2 => 1,
                _ => 10,
            };
            settings.recent_files.insert(
                (*name).to_string(),
                FileSettings {
                    last_accessed: now - Duration::seconds(age),
                    ..FileSettings::default()
                },
            );
        }

        let recent = settings.recent_files(20);
        assert_eq!(
            recent,
            vec![
                PathBuf::from("/d/new.PDF"),
                PathBuf::from("/d/mid.pdf"),
                PathBuf::from("/d/old.pdf"),
            ]
        );
        assert_eq!(settings.recent_files(1).len(), 1);
    }

    #[test]
    fn remove_and_clear() {
        let mut settings = Settings::default();
        settings.update_file_settings(Path::new("/d/a.pdf"), 0.0, 3);
        settings.update_file_settings(Path::new("/d/b.pdf"), 0.0, 3);

        assert!(settings.remove_recent(Path::new("/d/b.pdf")));
        assert!(settings.last_file.is_none());
        assert!(!settings.remove_recent(Path::new("/d/b.pdf")));

        settings.clear_recent();
        assert!(settings.recent_files.is_empty());
    }

    #[test]
    fn cleanup_missing_drops_vanished_files() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.pdf");
        fs::write(&kept, b"%PDF").unwrap();

        let mut settings = Settings::default();
        settings.update_file_settings(&kept, 0.2, 3);
        settings.update_file_settings(&dir.path().join("gone.pdf"), 0.2, 3);

        assert_eq!(settings.cleanup_missing(), 1);
        assert_eq!(settings.recent_files.len(), 1);
        assert!(settings.last_file.is_none());
    }

    #[test]
    fn recent_list_is_bounded() {
        let mut settings = Settings::default();
        for i in 0..(RECENT_FILES_LIMIT + 5) {
            settings.update_file_settings(Path::new(&format!("/d/{i}.pdf")), 0.0, 3);
        }
        assert_eq!(settings.recent_files.len(), RECENT_FILES_LIMIT);
    }

    #[test]
    fn language_is_normalized() {
        assert_eq!(normalize_language("ja-JP"), "ja_JP");
        assert_eq!(normalize_language("zh_tw"), "zh_TW");
        assert_eq!(normalize_language("fr_FR"), "en_US");
    }

    #[test]
    fn normalized_paths_use_forward_slashes() {
        let normalized = normalize_path(Path::new("some/relative/file.pdf"));
        assert!(!normalized.contains('\\'));
        assert!(Path::new(&normalized).is_absolute());
    }

    #[test]
    fn missing_file_loads_defaults_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.yaml");

        let store = SettingsStore::load(path.clone()).unwrap();
        assert_eq!(store.settings().version, CURRENT_VERSION);
        assert!(!path.exists());
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "recent_files: [this, is: not valid").unwrap();

        assert!(matches!(
            SettingsStore::load(path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn migration_survives_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let original = "language: zh-tw\nrecent_files: {}\n";
        fs::write(&path, original).unwrap();
        // A directory where the temp file should go makes the rewrite fail
        fs::create_dir(path.with_extension("yaml.tmp")).unwrap();

        let store = SettingsStore::load(path.clone()).unwrap();
        assert_eq!(store.settings().version, CURRENT_VERSION);
        assert_eq!(store.settings().language(), "zh_TW");
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn old_version_is_migrated_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            concat!(
                "language: ja-JP\n",
                "last_file: /d/./a.pdf\n",
                "recent_files:\n",
                "  /d/./a.pdf:\n",
                "    scroll_position: 0.5\n",
            ),
        )
        .unwrap();

        let store = SettingsStore::load(path.clone()).unwrap();
        let settings = store.settings();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.language(), "ja_JP");
        assert_eq!(settings.file_settings(Path::new("/d/a.pdf")).scroll_position, 0.5);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains(&format!("version: {CURRENT_VERSION}")));
    }
}
