//! Area capture: rasterize a selected region of the page column

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::clipboard::{ClipboardError, ClipboardSink};
use crate::config::{CANVAS_BACKGROUND_RGB, MIN_SELECTION_SIZE};
use crate::pdf::{MAX_BITMAP_DIMENSION, PageBitmap, PageLayout, Rasterizer, ViewRect};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Selection is empty")]
    EmptySelection,

    #[error("Selection {width:.0}x{height:.0} is too small")]
    SelectionTooSmall { width: f32, height: f32 },

    #[error("Selection does not cover any page")]
    NoPagesInSelection,

    #[error("Selection {width:.0}x{height:.0} is too large to capture")]
    SelectionTooLarge { width: f32, height: f32 },

    #[error("Failed to render page {}: {reason}", page + 1)]
    Render { page: usize, reason: Arc<str> },

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

impl CaptureError {
    /// True for problems with the selection itself, as opposed to rendering
    /// or clipboard failures
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptySelection
                | Self::SelectionTooSmall { .. }
                | Self::NoPagesInSelection
                | Self::SelectionTooLarge { .. }
        )
    }
}

/// Reject selections that cannot produce a useful image
pub fn validate_selection(selection: &ViewRect) -> Result<(), CaptureError> {
    let (width, height) = (selection.width, selection.height);
    if !(width > 0.0 && height > 0.0) {
        return Err(CaptureError::EmptySelection);
    }
    if width < MIN_SELECTION_SIZE || height < MIN_SELECTION_SIZE {
        return Err(CaptureError::SelectionTooSmall { width, height });
    }
    if width > MAX_BITMAP_DIMENSION || height > MAX_BITMAP_DIMENSION {
        return Err(CaptureError::SelectionTooLarge { width, height });
    }
    Ok(())
}

/// Render the part of the page column under `selection`.
///
/// Pages are rasterized at the layout's zoom. Areas between and beside
/// pages take the canvas background color.
pub fn capture_region(
    layout: &PageLayout,
    selection: &ViewRect,
    rasterizer: &dyn Rasterizer,
) -> Result<RgbaImage, CaptureError> {
    validate_selection(selection)?;

    let covered: Vec<(usize, ViewRect, ViewRect)> = layout
        .pages_in(selection)
        .into_iter()
        .filter_map(|page| {
            let rect = layout.page_rect(page)?;
            let overlap = rect.intersection(selection)?;
            Some((page, rect, overlap))
        })
        .collect();
    if covered.is_empty() {
        return Err(CaptureError::NoPagesInSelection);
    }

    let width = selection.width.round().max(1.0) as u32;
    let height = selection.height.round().max(1.0) as u32;
    let [r, g, b] = CANVAS_BACKGROUND_RGB;
    let mut image = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));

    for (page, rect, overlap) in covered {
        let bitmap = rasterizer
            .rasterize(page, layout.zoom())
            .map_err(|e| CaptureError::Render {
                page,
                reason: Arc::from(e.to_string()),
            })?;
        blit(
            &bitmap,
            &mut image,
            (overlap.x - rect.x, overlap.y - rect.y),
            (overlap.x - selection.x, overlap.y - selection.y),
            (overlap.width, overlap.height),
        );
    }

    log::info!(
        "Captured {width}x{height} region at zoom {:.2}",
        layout.zoom()
    );
    Ok(image)
}

/// Validate, render and place the result on the clipboard.
///
/// Nothing is written to the clipboard unless rendering succeeded.
pub fn copy_region(
    layout: &PageLayout,
    selection: &ViewRect,
    rasterizer: &dyn Rasterizer,
    clipboard: &mut dyn ClipboardSink,
) -> Result<(u32, u32), CaptureError> {
    let image = capture_region(layout, selection, rasterizer)?;
    clipboard.set_image(&image)?;
    Ok(image.dimensions())
}

/// Copy a `size` block from `src` at `src_origin` into `dst` at `dst_origin`
fn blit(
    src: &PageBitmap,
    dst: &mut RgbaImage,
    src_origin: (f32, f32),
    dst_origin: (f32, f32),
    size: (f32, f32),
) {
    let sx0 = src_origin.0.floor().max(0.0) as u32;
    let sy0 = src_origin.1.floor().max(0.0) as u32;
    let dx0 = dst_origin.0.floor().max(0.0) as u32;
    let dy0 = dst_origin.1.floor().max(0.0) as u32;

    let w = (size.0.round() as u32)
        .min(src.width.saturating_sub(sx0))
        .min(dst.width().saturating_sub(dx0));
    let h = (size.1.round() as u32)
        .min(src.height.saturating_sub(sy0))
        .min(dst.height().saturating_sub(dy0));

    for y in 0..h {
        for x in 0..w {
            if let Some([r, g, b]) = src.pixel(sx0 + x, sy0 + y) {
                dst.put_pixel(dx0 + x, dy0 + y, Rgba([r, g, b, 255]));
            }
        }
    }
}
