//! Core types for PDF rendering

use std::sync::atomic::{AtomicU64, Ordering};

use super::ZOOM_PRECISION;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an opened document.
///
/// A fresh id is handed out every time a file is opened, so reopening the
/// same path never aliases bitmaps rendered from an older copy of the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(u64);

impl DocumentId {
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Cache key for a rendered page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub document: DocumentId,
    /// Page number (0-indexed)
    pub page: usize,
    /// Zoom factor stored in fixed precision for stable hashing
    pub zoom_fixed: u32,
}

impl PageKey {
    #[must_use]
    pub fn new(document: DocumentId, page: usize, zoom: f32) -> Self {
        Self {
            document,
            page,
            zoom_fixed: quantize_zoom(zoom),
        }
    }

    /// Zoom factor this key renders at, after rounding
    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom_fixed as f32 / ZOOM_PRECISION as f32
    }
}

/// Round a zoom factor to the cache precision
#[must_use]
pub fn quantize_zoom(zoom: f32) -> u32 {
    if !zoom.is_finite() || zoom <= 0.0 {
        return 0;
    }
    (zoom * ZOOM_PRECISION as f32).round() as u32
}

/// Page dimensions in PDF points
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    /// Pixel dimensions of this page rasterized at `zoom`
    #[must_use]
    pub fn scaled(&self, zoom: f32) -> (f32, f32) {
        (self.width_pt * zoom, self.height_pt * zoom)
    }
}

/// Rasterized page image.
///
/// RGB pixel data, 3 bytes per pixel, rows tightly packed.
#[derive(Clone)]
pub struct PageBitmap {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PageBitmap {
    /// Bitmap filled with a single color
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    /// RGB value at (x, y), if inside the bitmap
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels
            .get(idx..idx + 3)
            .map(|px| [px[0], px[1], px[2]])
    }
}

impl std::fmt::Debug for PageBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_rounds_to_fixed_precision() {
        let doc = DocumentId::next();
        let a = PageKey::new(doc, 3, 1.2345);
        let b = PageKey::new(doc, 3, 1.2346);
        assert_eq!(a, b);
        assert_eq!(a.zoom_fixed, 1235);
        assert!((a.zoom() - 1.235).abs() < 1e-6);
    }

    #[test]
    fn distinct_zooms_make_distinct_keys() {
        let doc = DocumentId::next();
        assert_ne!(PageKey::new(doc, 0, 1.0), PageKey::new(doc, 0, 1.1));
    }

    #[test]
    fn degenerate_zoom_quantizes_to_zero() {
        assert_eq!(quantize_zoom(f32::NAN), 0);
        assert_eq!(quantize_zoom(-1.0), 0);
    }

    #[test]
    fn document_ids_are_unique() {
        let a = DocumentId::next();
        let b = DocumentId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn filled_bitmap_pixels() {
        let bmp = PageBitmap::filled(4, 2, [1, 2, 3]);
        assert_eq!(bmp.pixels.len(), 24);
        assert_eq!(bmp.pixel(3, 1), Some([1, 2, 3]));
        assert_eq!(bmp.pixel(4, 0), None);
    }
}
