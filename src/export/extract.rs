//! Copy a page range out of a PDF with lopdf

use std::path::Path;

use lopdf::Document;

use super::ExportError;
use super::range::ExportRange;

/// Build a standalone PDF holding exactly the pages of `range`, in order
pub fn extract_range(source: &Path, range: ExportRange) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::load(source).map_err(|e| ExportError::Load {
        path: source.to_path_buf(),
        detail: e.to_string(),
    })?;
    extract_from_document(&mut doc, range)
}

/// Same as [`extract_range`] for a document already in memory
pub fn extract_range_from_bytes(bytes: &[u8], range: ExportRange) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::load_mem(bytes).map_err(|e| ExportError::Load {
        path: "<memory>".into(),
        detail: e.to_string(),
    })?;
    extract_from_document(&mut doc, range)
}

fn extract_from_document(doc: &mut Document, range: ExportRange) -> Result<Vec<u8>, ExportError> {
    // lopdf numbers pages from 1
    let pages = doc.get_pages();
    let page_count = pages.len();
    if page_count == 0 {
        return Err(ExportError::EmptyDocument);
    }
    if range.end() >= page_count {
        return Err(ExportError::PageOutOfRange {
            page: range.end(),
            page_count,
        });
    }

    let doomed: Vec<u32> = pages
        .keys()
        .copied()
        .filter(|number| !range.contains(*number as usize - 1))
        .collect();
    doc.delete_pages(&doomed);
    doc.prune_objects();
    doc.renumber_objects();

    let kept = doc.get_pages().len();
    if kept != range.len() {
        return Err(ExportError::PageCountMismatch {
            expected: range.len(),
            actual: kept,
        });
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::Serialize(e.to_string()))?;

    log::debug!("Extracted {range} ({} bytes)", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_helpers::{numbered_pdf_bytes, page_widths};

    #[test]
    fn extracts_tail_window() {
        let source = numbered_pdf_bytes(10);
        let range = ExportRange::ending_at(6, 3, 10).unwrap();

        let out = extract_range_from_bytes(&source, range).unwrap();
        assert_eq!(page_widths(&out), vec![104, 105, 106]);
    }

    #[test]
    fn single_page_document() {
        let source = numbered_pdf_bytes(1);
        let range = ExportRange::ending_at(0, 3, 1).unwrap();

        let out = extract_range_from_bytes(&source, range).unwrap();
        assert_eq!(page_widths(&out), vec![100]);
    }

    #[test]
    fn range_past_document_is_rejected() {
        let source = numbered_pdf_bytes(2);
        let range = ExportRange::ending_at(4, 2, 5).unwrap();

        let err = extract_range_from_bytes(&source, range).unwrap_err();
        assert!(matches!(err, ExportError::PageOutOfRange { page: 4, page_count: 2 }));
    }

    #[test]
    fn unparsable_input_is_a_load_error() {
        let range = ExportRange::ending_at(0, 1, 1).unwrap();
        let err = extract_range_from_bytes(b"not a pdf", range).unwrap_err();
        assert!(matches!(err, ExportError::Load { .. }));
    }
}
