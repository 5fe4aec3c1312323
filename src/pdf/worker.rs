//! PDF render worker - runs in separate thread(s)

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::MAX_BITMAP_DIMENSION;
use super::request::{RenderEvent, RenderFault, RenderJob, WorkerMessage};
use super::service::{CacheState, lock_state};
use super::types::{PageBitmap, PageKey};

/// Turns a page of one document into pixels.
///
/// Implementations need not be `Send`: every worker thread builds its own
/// through a [`RasterizerFactory`].
pub trait Rasterizer {
    fn rasterize(&self, page: usize, zoom: f32) -> Result<PageBitmap, RenderFault>;
}

/// Builds a rasterizer inside a worker thread
pub type RasterizerFactory =
    Arc<dyn Fn() -> Result<Box<dyn Rasterizer>, RenderFault> + Send + Sync>;

/// MuPDF-backed rasterizer for a single document
pub struct MupdfRasterizer {
    doc: Document,
}

impl MupdfRasterizer {
    pub fn open(path: &Path) -> Result<Self, RenderFault> {
        let doc = Document::open(path.to_string_lossy().as_ref())?;
        Ok(Self { doc })
    }

    /// Factory that opens `path` once per worker thread
    #[must_use]
    pub fn factory(path: PathBuf) -> RasterizerFactory {
        Arc::new(move || {
            let rasterizer = Self::open(&path)?;
            Ok(Box::new(rasterizer) as Box<dyn Rasterizer>)
        })
    }
}

impl Rasterizer for MupdfRasterizer {
    fn rasterize(&self, page_num: usize, zoom: f32) -> Result<PageBitmap, RenderFault> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(RenderFault::generic(format!("Invalid zoom factor {zoom}")));
        }

        let page = self.doc.load_page(page_num as i32)?;
        let bounds = page.bounds()?;
        let out_width = (bounds.x1 - bounds.x0) * zoom;
        let out_height = (bounds.y1 - bounds.y0) * zoom;
        if out_width.max(out_height) > MAX_BITMAP_DIMENSION {
            return Err(RenderFault::generic(format!(
                "Page {} is too large to render at zoom {zoom:.2}",
                page_num + 1
            )));
        }

        let rgb = Colorspace::device_rgb();
        let transform = Matrix::new_scale(zoom, zoom);
        let pixmap = page.to_pixmap(&transform, &rgb, false, false)?;
        let pixels = pixmap_to_rgb(&pixmap)?;

        Ok(PageBitmap {
            pixels,
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RenderFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RenderFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(RenderFault::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}

/// Main worker function - runs in a dedicated thread
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub(crate) fn render_worker(
    open: RasterizerFactory,
    requests: Receiver<WorkerMessage>,
    events: Sender<RenderEvent>,
    state: Arc<Mutex<CacheState>>,
) {
    // A worker that cannot open the document keeps draining its queue so
    // every job still ends in a completion event.
    let rasterizer: Result<Box<dyn Rasterizer>, Arc<str>> = open().map_err(|e| {
        log::error!("Render worker could not open document: {e}");
        Arc::from(e.to_string())
    });

    for message in requests {
        match message {
            WorkerMessage::Render(job) => {
                let rasterizer = rasterizer.as_ref().map(|r| &**r);
                handle_job(rasterizer, job, &state, &events);
            }
            WorkerMessage::Shutdown => break,
        }
    }
}

fn handle_job(
    rasterizer: Result<&dyn Rasterizer, &Arc<str>>,
    job: RenderJob,
    state: &Mutex<CacheState>,
    events: &Sender<RenderEvent>,
) {
    let key = job.key;

    {
        let mut guard = lock_state(state);
        // Checked under the state lock so a concurrent `get` can revive the job
        if job.cancel.is_cancelled() {
            guard.in_flight.remove(&key);
            drop(guard);
            log::debug!("Skipping cancelled render of page {}", key.page);
            let _ = events.send(RenderEvent::Cancelled { key });
            return;
        }
    }

    let outcome = match rasterizer {
        Ok(rasterizer) => rasterize_isolated(rasterizer, key),
        Err(reason) => Err(Arc::clone(reason)),
    };

    let mut guard = lock_state(state);
    guard.in_flight.remove(&key);
    let event = match outcome {
        Ok(bitmap) => {
            let bitmap = guard.cache.insert(key, bitmap);
            RenderEvent::Ready { key, bitmap }
        }
        Err(reason) => {
            log::warn!("Failed to render page {}: {reason}", key.page + 1);
            guard.failed.insert(key, Arc::clone(&reason));
            RenderEvent::Failed { key, reason }
        }
    };
    drop(guard);

    let _ = events.send(event);
}

/// Rasterize one page, turning errors and panics into a failure reason
fn rasterize_isolated(rasterizer: &dyn Rasterizer, key: PageKey) -> Result<PageBitmap, Arc<str>> {
    let result = catch_unwind(AssertUnwindSafe(|| {
        rasterizer.rasterize(key.page, key.zoom())
    }));

    match result {
        Ok(Ok(bitmap)) => {
            let expected = bitmap.width as usize * bitmap.height as usize * 3;
            if bitmap.pixels.len() == expected {
                Ok(bitmap)
            } else {
                Err(Arc::from(format!(
                    "Rendered buffer holds {} bytes, expected {expected}",
                    bitmap.pixels.len()
                )))
            }
        }
        Ok(Err(e)) => Err(Arc::from(e.to_string())),
        Err(_) => Err(Arc::from("Renderer panicked")),
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::DocumentId;
    use super::*;

    struct Fixed;

    impl Rasterizer for Fixed {
        fn rasterize(&self, _page: usize, _zoom: f32) -> Result<PageBitmap, RenderFault> {
            Ok(PageBitmap::filled(2, 2, [0, 0, 0]))
        }
    }

    struct Short;

    impl Rasterizer for Short {
        fn rasterize(&self, _page: usize, _zoom: f32) -> Result<PageBitmap, RenderFault> {
            Ok(PageBitmap {
                pixels: vec![0; 5],
                width: 2,
                height: 2,
            })
        }
    }

    struct Panicky;

    impl Rasterizer for Panicky {
        fn rasterize(&self, _page: usize, _zoom: f32) -> Result<PageBitmap, RenderFault> {
            panic!("corrupt content stream");
        }
    }

    fn key() -> PageKey {
        PageKey::new(DocumentId::next(), 0, 1.0)
    }

    #[test]
    fn isolated_render_passes_through_bitmap() {
        let bitmap = rasterize_isolated(&Fixed, key()).expect("fixed rasterizer succeeds");
        assert_eq!((bitmap.width, bitmap.height), (2, 2));
    }

    #[test]
    fn isolated_render_rejects_short_buffer() {
        let err = rasterize_isolated(&Short, key()).expect_err("short buffer rejected");
        assert!(err.contains("expected 12"));
    }

    #[test]
    fn isolated_render_catches_panics() {
        let err = rasterize_isolated(&Panicky, key()).expect_err("panic becomes failure");
        assert_eq!(&*err, "Renderer panicked");
    }
}
