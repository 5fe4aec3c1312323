use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use eframe::egui;
use log::{LevelFilter, info, warn};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};

use pdfcrop::PdfCropApp;
use pdfcrop::clipboard::SystemClipboard;
use pdfcrop::config::{log_file_path, settings_file_path};
use pdfcrop::export::{Exporter, cleanup_temp_files};
use pdfcrop::panic_handler;
use pdfcrop::settings::{SettingsError, SettingsStore};

/// PDF viewer that copies page ranges and screen regions to the clipboard
#[derive(Parser, Debug)]
#[command(name = "pdfcrop", version, about)]
struct Cli {
    /// PDF file to open
    path: Option<PathBuf>,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    log_level: LevelFilter,

    /// Settings file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,
}

fn init_logging(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Error)
        .build();

    let file = log_file_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        File::create(&path).ok()
    });

    let result = match file {
        Some(file) => WriteLogger::init(level, config, file),
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn load_settings(path: Option<PathBuf>) -> Result<SettingsStore> {
    let path = match path.or_else(settings_file_path) {
        Some(path) => path,
        None => {
            warn!("Could not determine config directory, settings will not persist");
            return Ok(SettingsStore::with_defaults(PathBuf::from("pdfcrop.yaml")));
        }
    };

    match SettingsStore::load(path.clone()) {
        Ok(store) => Ok(store),
        Err(e @ SettingsError::Parse { .. }) => {
            // Keep the unreadable file around instead of overwriting it
            let backup = path.with_extension("yaml.bak");
            warn!("{e}; moving it to {}", backup.display());
            if let Err(rename_err) = fs::rename(&path, &backup) {
                warn!("Failed to back up settings: {rename_err}");
            }
            Ok(SettingsStore::with_defaults(path))
        }
        Err(e) => Err(e).context("Failed to load settings"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_level);
    panic_handler::initialize_panic_handler();
    info!("Starting pdfcrop {}", env!("CARGO_PKG_VERSION"));

    let store = load_settings(cli.settings)?;
    let exporter = Exporter::default();
    let temp_dir = exporter.temp_dir().to_path_buf();

    let mut viewport = egui::ViewportBuilder::default()
        .with_title("pdfcrop")
        .with_inner_size([1000.0, 800.0])
        .with_min_inner_size([400.0, 300.0])
        .with_drag_and_drop(true);
    if let Some(geometry) = store.settings().window_geometry {
        viewport = viewport
            .with_inner_size([geometry.width, geometry.height])
            .with_position([geometry.x, geometry.y]);
    }
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    let initial = cli.path;
    let result = eframe::run_native(
        "pdfcrop",
        options,
        Box::new(move |cc| {
            Ok(Box::new(PdfCropApp::new(
                cc,
                store,
                initial,
                Box::new(SystemClipboard::new()),
                exporter,
            )))
        }),
    );

    cleanup_temp_files(&temp_dir);
    info!("Shutting down pdfcrop");

    result.map_err(|e| anyhow!("{e}"))
}
