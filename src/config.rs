//! Application-wide tunables and well-known locations

use std::path::PathBuf;

pub const APP_NAME: &str = "pdfcrop";

/// Pages exported when a file has no stored preference
pub const DEFAULT_MAX_EXTRACT_PAGES: usize = 3;
/// Upper bound offered by the toolbar spinner
pub const MAX_EXTRACT_PAGES_LIMIT: usize = 100;
/// Smallest capture selection, in pixels, on either axis
pub const MIN_SELECTION_SIZE: f32 = 5.0;
/// Vertical gap between pages, in pixels
pub const PAGE_PADDING: f32 = 10.0;
pub const RECENT_FILES_LIMIT: usize = 20;

pub const PLACEHOLDER_RGB: [u8; 3] = [0xf0, 0xf0, 0xf0];
pub const CANVAS_BACKGROUND_RGB: [u8; 3] = [0x50, 0x50, 0x50];

pub const SUPPORTED_LANGUAGES: [&str; 4] = ["en_US", "ja_JP", "zh_CN", "zh_TW"];
pub const DEFAULT_LANGUAGE: &str = "en_US";

/// `<data_local_dir>/pdfcrop/logs/app.log`
#[must_use]
pub fn log_file_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_NAME).join("logs").join("app.log"))
}

/// `<config_dir>/pdfcrop/config.yaml`
#[must_use]
pub fn settings_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.yaml"))
}
