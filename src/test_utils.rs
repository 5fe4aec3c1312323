pub mod test_helpers {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::RgbaImage;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    use crate::clipboard::{ClipboardError, ClipboardSink};
    use crate::pdf::{PageBitmap, Rasterizer, RasterizerFactory, RenderFault};

    /// PDF with `pages` pages. Page `i` is `100 + i` points wide, which lets
    /// tests tell pages apart after extraction.
    pub fn numbered_pdf_bytes(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(pages);
        for i in 0..pages {
            let width = 100 + i as i64;
            let content = Content {
                operations: vec![
                    Operation::new(
                        "rg",
                        vec![Object::Real(0.2), Object::Real(0.4), Object::Real(0.8)],
                    ),
                    Operation::new("re", vec![10.into(), 10.into(), 50.into(), 50.into()]),
                    Operation::new("f", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content stream"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Integer(width), 200.into()],
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize fixture");
        bytes
    }

    pub fn write_numbered_pdf(path: &Path, pages: usize) -> PathBuf {
        std::fs::write(path, numbered_pdf_bytes(pages)).expect("write fixture");
        path.to_path_buf()
    }

    /// MediaBox widths of every page, in page order
    pub fn page_widths(bytes: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(bytes).expect("parse PDF");
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).expect("page dictionary");
                let media_box = page
                    .get(b"MediaBox")
                    .and_then(Object::as_array)
                    .expect("MediaBox");
                media_box[2].as_i64().expect("integer width")
            })
            .collect()
    }

    /// Clipboard that remembers what was placed on it
    #[derive(Default)]
    pub struct RecordingClipboard {
        pub images: Vec<(u32, u32)>,
        pub files: Vec<PathBuf>,
        pub fail_with: Option<String>,
    }

    impl ClipboardSink for RecordingClipboard {
        fn set_image(&mut self, image: &RgbaImage) -> Result<(), ClipboardError> {
            if let Some(detail) = &self.fail_with {
                return Err(ClipboardError::Command {
                    program: "test".to_string(),
                    detail: detail.clone(),
                });
            }
            self.images.push(image.dimensions());
            Ok(())
        }

        fn set_file(&mut self, path: &Path) -> Result<(), ClipboardError> {
            if let Some(detail) = &self.fail_with {
                return Err(ClipboardError::Command {
                    program: "test".to_string(),
                    detail: detail.clone(),
                });
            }
            self.files.push(path.to_path_buf());
            Ok(())
        }
    }

    /// Rasterizer producing blank pages and counting its calls
    pub struct CountingRasterizer {
        pub calls: Arc<AtomicUsize>,
        pub delay: std::time::Duration,
    }

    impl Rasterizer for CountingRasterizer {
        fn rasterize(&self, _page: usize, zoom: f32) -> Result<PageBitmap, RenderFault> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            let side = (10.0 * zoom).round().max(1.0) as u32;
            Ok(PageBitmap::filled(side, side, [255, 255, 255]))
        }
    }

    /// Factory handing every worker a [`CountingRasterizer`] sharing `calls`
    pub fn counting_factory(
        calls: &Arc<AtomicUsize>,
        delay: std::time::Duration,
    ) -> RasterizerFactory {
        let calls = Arc::clone(calls);
        Arc::new(move || {
            Ok(Box::new(CountingRasterizer {
                calls: Arc::clone(&calls),
                delay,
            }) as Box<dyn Rasterizer>)
        })
    }
}
