//! Export of a page window as a standalone PDF file

pub mod extract;
pub mod filename;
pub mod range;

use std::path::{Path, PathBuf};

pub use extract::{extract_range, extract_range_from_bytes};
pub use filename::{export_file_name, sanitize_filename};
pub use range::ExportRange;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Document has no pages")]
    EmptyDocument,

    #[error("Invalid page range {start}..{end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("Page {} is out of range (document has {page_count} pages)", page + 1)]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("Exported PDF has {actual} pages, expected {expected}")]
    PageCountMismatch { expected: usize, actual: usize },

    #[error("Failed to read {}: {detail}", path.display())]
    Load { path: PathBuf, detail: String },

    #[error("Failed to serialize PDF: {0}")]
    Serialize(String),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes exported page windows into a scratch directory
#[derive(Clone, Debug)]
pub struct Exporter {
    temp_dir: PathBuf,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(default_temp_dir())
    }
}

impl Exporter {
    #[must_use]
    pub fn new(temp_dir: PathBuf) -> Self {
        Self { temp_dir }
    }

    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Extract `range` from `source` and write it next to earlier exports.
    ///
    /// Returns the path of the written file. An existing file with the same
    /// name is replaced.
    pub fn export(
        &self,
        source: &Path,
        stem: &str,
        range: ExportRange,
    ) -> Result<PathBuf, ExportError> {
        let bytes = extract_range(source, range)?;

        std::fs::create_dir_all(&self.temp_dir).map_err(|source| ExportError::Io {
            path: self.temp_dir.clone(),
            source,
        })?;

        let target = self.temp_dir.join(export_file_name(stem, range));
        std::fs::write(&target, &bytes).map_err(|source| ExportError::Io {
            path: target.clone(),
            source,
        })?;

        log::info!(
            "Exported {range} of {} to {}",
            source.display(),
            target.display()
        );
        Ok(target)
    }
}

/// Scratch directory for exported files
#[must_use]
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("pdfcrop")
}

/// Delete exported PDFs in `dir`, then `dir` itself if nothing else is left.
///
/// Errors are logged and otherwise ignored. Returns how many files were removed.
pub fn cleanup_temp_files(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            log::warn!("Cannot list temp directory {}: {e}", dir.display());
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf || !path.is_file() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
        }
    }

    let is_empty = std::fs::read_dir(dir).is_ok_and(|mut rest| rest.next().is_none());
    if is_empty {
        if let Err(e) = std::fs::remove_dir(dir) {
            log::warn!("Failed to remove {}: {e}", dir.display());
        }
    }

    if removed > 0 {
        log::info!("Removed {removed} exported files from {}", dir.display());
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{page_widths, write_numbered_pdf};

    #[test]
    fn export_writes_named_file() {
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("lecture.pdf");
        write_numbered_pdf(&source, 10);

        let exporter = Exporter::new(scratch.path().join("out"));
        let range = ExportRange::ending_at(1, 3, 10).unwrap();
        let path = exporter.export(&source, "lecture", range).unwrap();

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("lecture-from-0001-to-0002.pdf")
        );
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(page_widths(&bytes), vec![100, 101]);
    }

    #[test]
    fn missing_source_is_a_load_error() {
        let scratch = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(scratch.path().to_path_buf());
        let range = ExportRange::ending_at(0, 1, 1).unwrap();

        let err = exporter
            .export(&scratch.path().join("gone.pdf"), "gone", range)
            .unwrap_err();
        assert!(matches!(err, ExportError::Load { .. }));
    }

    #[test]
    fn cleanup_removes_pdfs_and_empty_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().join("exports");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a-from-0001-to-0001.pdf"), b"x").unwrap();
        std::fs::write(dir.join("b.PDF"), b"x").unwrap();

        assert_eq!(cleanup_temp_files(&dir), 2);
        assert!(!dir.exists());
    }

    #[test]
    fn cleanup_keeps_foreign_files() {
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path().to_path_buf();
        std::fs::write(dir.join("a.pdf"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();

        assert_eq!(cleanup_temp_files(&dir), 1);
        assert!(dir.join("notes.txt").exists());
        assert!(dir.exists());
    }

    #[test]
    fn cleanup_of_missing_dir_is_a_no_op() {
        let scratch = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_temp_files(&scratch.path().join("never")), 0);
    }
}
