pub mod app;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod export;
pub mod panic_handler;
pub mod pdf;
pub mod settings;

pub mod test_utils;

pub use app::PdfCropApp;
pub use settings::{Settings, SettingsStore};
