//! PDF rendering infrastructure

mod cache;
mod document;
mod layout;
mod request;
mod service;
mod types;
mod worker;
mod zoom;

pub use cache::{CacheEntry, PageCache};
pub use document::{DocumentError, DocumentSource};
pub use layout::{PageLayout, ViewRect, fit_width_zoom};
pub use request::{CancelFlag, PageLookup, RenderEvent, RenderFault};
pub use service::{RenderConfig, RenderService};
pub use types::*;
pub use worker::{MupdfRasterizer, Rasterizer, RasterizerFactory};
pub use zoom::*;

/// Render threads per open document
pub const DEFAULT_WORKERS: usize = 2;
/// Bitmaps kept per open document
pub const DEFAULT_CACHE_SIZE: usize = 24;
/// Pages rendered ahead of and behind the visible range
pub const DEFAULT_PRELOAD_RANGE: usize = 2;
/// Zoom factors are keyed in thousandths
pub const ZOOM_PRECISION: u32 = 1000;
pub const DEFAULT_ZOOM: f32 = 1.0;
/// Largest edge, in pixels, of a single rendered page
pub const MAX_BITMAP_DIMENSION: f32 = 16384.0;
