//! Opened PDF file: identity, page count and page geometry

use std::path::{Path, PathBuf};

use mupdf::Document;

use super::service::{RenderConfig, RenderService};
use super::types::{DocumentId, PageSize};
use super::worker::{MupdfRasterizer, RasterizerFactory};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{} contains no pages", path.display())]
    Empty { path: PathBuf },

    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: mupdf::error::Error,
    },
}

/// Metadata of an opened PDF.
///
/// The MuPDF handle used to read it is dropped right away; render workers
/// open their own copies.
#[derive(Clone, Debug)]
pub struct DocumentSource {
    id: DocumentId,
    path: PathBuf,
    page_sizes: Vec<PageSize>,
    title: Option<String>,
}

impl DocumentSource {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        if !path.is_file() {
            return Err(DocumentError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let open_err = |source| DocumentError::Open {
            path: path.to_path_buf(),
            source,
        };

        let doc = Document::open(path.to_string_lossy().as_ref()).map_err(open_err)?;
        let page_count = doc.page_count().map_err(open_err)?.max(0) as usize;
        if page_count == 0 {
            return Err(DocumentError::Empty {
                path: path.to_path_buf(),
            });
        }

        let mut page_sizes = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let page = doc.load_page(index as i32).map_err(open_err)?;
            let bounds = page.bounds().map_err(open_err)?;
            page_sizes.push(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0));
        }

        let title = doc
            .metadata(mupdf::MetadataName::Title)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let source = Self::from_parts(path.to_path_buf(), page_sizes, title);
        log::info!(
            "Opened {} ({} pages, id {})",
            path.display(),
            source.page_count(),
            source.id.raw()
        );
        Ok(source)
    }

    /// Build a source from already known geometry, assigning a fresh id
    #[must_use]
    pub fn from_parts(path: PathBuf, page_sizes: Vec<PageSize>, title: Option<String>) -> Self {
        Self {
            id: DocumentId::next(),
            path,
            page_sizes,
            title,
        }
    }

    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    #[must_use]
    pub fn page_size(&self, page: usize) -> Option<PageSize> {
        self.page_sizes.get(page).copied()
    }

    #[must_use]
    pub fn page_sizes(&self) -> &[PageSize] {
        &self.page_sizes
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Window caption: the embedded title, else the file name
    #[must_use]
    pub fn caption(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.stem());
        match self.title() {
            Some(title) => format!("{title} ({name}) - pdfcrop"),
            None => format!("{name} - pdfcrop"),
        }
    }

    /// File name without extension, used to name exports
    #[must_use]
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }

    #[must_use]
    pub fn rasterizer_factory(&self) -> RasterizerFactory {
        MupdfRasterizer::factory(self.path.clone())
    }

    /// Start a render service for this document
    #[must_use]
    pub fn render_service(&self, config: RenderConfig) -> RenderService {
        RenderService::with_config(self.id, self.page_count(), self.rasterizer_factory(), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = DocumentSource::open(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }

    #[test]
    fn garbage_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = DocumentSource::open(&path).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Open { .. } | DocumentError::Empty { .. }
        ));
    }

    #[test]
    fn parts_get_fresh_ids_and_stem() {
        let sizes = vec![PageSize::new(612.0, 792.0); 2];
        let a = DocumentSource::from_parts(PathBuf::from("/tmp/My Paper.pdf"), sizes.clone(), None);
        let b = DocumentSource::from_parts(PathBuf::from("/tmp/My Paper.pdf"), sizes, None);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.stem(), "My Paper");
        assert_eq!(a.page_count(), 2);
        assert_eq!(a.page_size(5), None);
        assert_eq!(a.caption(), "My Paper.pdf - pdfcrop");
    }

    #[test]
    fn caption_prefers_embedded_title() {
        let sizes = vec![PageSize::new(612.0, 792.0)];
        let source = DocumentSource::from_parts(
            PathBuf::from("/tmp/a1.pdf"),
            sizes,
            Some("Annual Report".to_string()),
        );
        assert_eq!(source.title(), Some("Annual Report"));
        assert_eq!(source.caption(), "Annual Report (a1.pdf) - pdfcrop");
    }
}
