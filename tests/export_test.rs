use pdfcrop::app::Session;
use pdfcrop::clipboard::ClipboardSink;
use pdfcrop::export::{ExportRange, Exporter, cleanup_temp_files, extract_range};
use pdfcrop::pdf::{DocumentSource, RenderConfig, ViewRect};
use pdfcrop::test_utils::test_helpers::{RecordingClipboard, page_widths, write_numbered_pdf};
use serial_test::serial;

#[test]
fn window_before_second_page_is_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_numbered_pdf(&dir.path().join("doc.pdf"), 10);

    // p = 1, window of 3 => [p-2, p] clamps to [0, 1]
    let range = ExportRange::ending_at(1, 3, 10).unwrap();
    assert_eq!(range.pages(), 0..=1);

    let bytes = extract_range(&path, range).unwrap();
    assert_eq!(page_widths(&bytes), vec![100, 101]);
}

#[test]
fn exported_page_count_matches_range() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_numbered_pdf(&dir.path().join("doc.pdf"), 10);

    for (current, window) in [(0, 1), (5, 3), (9, 10), (9, 4)] {
        let range = ExportRange::ending_at(current, window, 10).unwrap();
        let bytes = extract_range(&path, range).unwrap();
        let widths = page_widths(&bytes);
        assert_eq!(widths.len(), range.len());
        assert_eq!(widths.last().copied(), Some(100 + current as i64));
    }
}

#[test]
fn exported_file_opens_as_a_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_numbered_pdf(&dir.path().join("slides.pdf"), 6);
    let exporter = Exporter::new(dir.path().join("exports"));

    let range = ExportRange::clamped(2, 4, 6).unwrap();
    let out = exporter.export(&path, "slides", range).unwrap();

    let reopened = DocumentSource::open(&out).unwrap();
    assert_eq!(reopened.page_count(), 3);
    assert_eq!(reopened.page_size(0).map(|s| s.width_pt), Some(102.0));
}

#[test]
fn session_export_lands_on_clipboard() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_numbered_pdf(&dir.path().join("paper.pdf"), 10);
    let source = DocumentSource::open(&path).unwrap();
    let mut session = Session::new(source, RenderConfig::default());
    session.max_extract_pages = 2;

    // Pages are 200pt tall with a 10px gap; this viewport shows pages 3 and 4
    let viewport = ViewRect::new(0.0, 650.0, 100.0, 200.0);
    let range = session.export_range(&viewport).unwrap();
    assert_eq!(range.pages(), 3..=4);

    let exporter = Exporter::new(dir.path().join("exports"));
    let out = exporter
        .export(session.source().path(), &session.source().stem(), range)
        .unwrap();
    assert!(out.ends_with("paper-from-0004-to-0005.pdf"));

    let mut clipboard = RecordingClipboard::default();
    clipboard.set_file(&out).unwrap();
    assert_eq!(clipboard.files, vec![out]);
}

#[test]
#[serial]
fn default_exporter_cleans_up_after_itself() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_numbered_pdf(&dir.path().join("notes.pdf"), 3);
    let exporter = Exporter::default();

    let range = ExportRange::ending_at(2, 2, 3).unwrap();
    let out = exporter.export(&path, "notes", range).unwrap();
    assert!(out.starts_with(exporter.temp_dir()));
    assert!(out.exists());

    assert!(cleanup_temp_files(exporter.temp_dir()) >= 1);
    assert!(!out.exists());
}
