//! One open document as seen by the viewer: layout, zoom and page requests

use std::ops::RangeInclusive;

use crate::config::PAGE_PADDING;
use crate::export::{ExportError, ExportRange};
use crate::pdf::{
    DEFAULT_PRELOAD_RANGE, DocumentSource, PageKey, PageLayout, PageLookup, RasterizerFactory,
    RenderConfig, RenderEvent, RenderService, ViewRect, Zoom, fit_width_zoom,
};

pub struct Session {
    source: DocumentSource,
    service: RenderService,
    zoom: Zoom,
    layout: PageLayout,
    /// Device pixels per layout point; bitmaps are rendered at `zoom * this`
    pixels_per_point: f32,
    pub max_extract_pages: usize,
}

impl Session {
    #[must_use]
    pub fn new(source: DocumentSource, config: RenderConfig) -> Self {
        let factory = source.rasterizer_factory();
        Self::with_factory(source, factory, config)
    }

    /// Session whose pages come from `factory` instead of the file itself
    #[must_use]
    pub fn with_factory(
        source: DocumentSource,
        factory: RasterizerFactory,
        config: RenderConfig,
    ) -> Self {
        let service = RenderService::with_config(source.id(), source.page_count(), factory, config);
        let zoom = Zoom::default();
        let layout = PageLayout::new(source.page_sizes(), zoom.factor(), PAGE_PADDING);
        Self {
            source,
            service,
            zoom,
            layout,
            pixels_per_point: 1.0,
            max_extract_pages: crate::config::DEFAULT_MAX_EXTRACT_PAGES,
        }
    }

    #[must_use]
    pub fn source(&self) -> &DocumentSource {
        &self.source
    }

    #[must_use]
    pub fn service(&self) -> &RenderService {
        &self.service
    }

    #[must_use]
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom.factor()
    }

    #[must_use]
    pub fn scroll_offset(&self) -> f32 {
        self.zoom.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: f32, viewport_height: f32) {
        let max = self.layout.max_scroll(viewport_height);
        self.zoom.scroll_to(offset, max);
    }

    pub fn set_pixels_per_point(&mut self, ppp: f32) {
        if ppp.is_finite() && ppp > 0.0 {
            self.pixels_per_point = ppp;
        }
    }

    /// Change zoom, keeping the content under `anchor_y` (viewport-relative)
    /// in place. Returns true if the zoom actually changed.
    pub fn set_zoom(&mut self, factor: f32, anchor_y: f32) -> bool {
        let before = self.zoom.factor();
        self.zoom.set_factor(factor, anchor_y);
        self.relayout(before)
    }

    pub fn zoom_in(&mut self, anchor_y: f32) -> bool {
        let before = self.zoom.factor();
        self.zoom.step_in(anchor_y);
        self.relayout(before)
    }

    pub fn zoom_out(&mut self, anchor_y: f32) -> bool {
        let before = self.zoom.factor();
        self.zoom.step_out(anchor_y);
        self.relayout(before)
    }

    /// Zoom so the first page fills `viewport_width`
    pub fn fit_width(&mut self, viewport_width: f32) -> bool {
        let Some(first) = self.source.page_size(0) else {
            return false;
        };
        let factor = fit_width_zoom(first, viewport_width);
        self.set_zoom(factor, 0.0)
    }

    fn relayout(&mut self, before: f32) -> bool {
        if (self.zoom.factor() - before).abs() < f32::EPSILON {
            return false;
        }
        self.layout = PageLayout::new(self.source.page_sizes(), self.zoom.factor(), PAGE_PADDING);
        log::debug!("Zoom changed to {:.3}", self.zoom.factor());
        true
    }

    /// Zoom bitmaps are rasterized at: layout zoom times display density
    #[must_use]
    pub fn render_zoom(&self) -> f32 {
        self.zoom.factor() * self.pixels_per_point
    }

    /// Cache key for `page` at the current zoom and display density
    #[must_use]
    pub fn key(&self, page: usize) -> PageKey {
        self.service.key(page, self.render_zoom())
    }

    #[must_use]
    pub fn current_page(&self, viewport: &ViewRect) -> usize {
        self.layout.current_page(viewport)
    }

    /// Visible pages plus the preload margin around them
    #[must_use]
    pub fn wanted_pages(&self, viewport: &ViewRect) -> Option<RangeInclusive<usize>> {
        let visible = self.layout.visible_range(viewport)?;
        let start = visible.start().saturating_sub(DEFAULT_PRELOAD_RANGE);
        let last = self.layout.page_count().saturating_sub(1);
        let end = (visible.end() + DEFAULT_PRELOAD_RANGE).min(last);
        Some(start..=end)
    }

    /// Look up every visible page, schedule the preload margin and drop
    /// queued work for pages that scrolled away
    pub fn request_visible(&self, viewport: &ViewRect) -> Vec<(usize, PageLookup)> {
        let Some(wanted) = self.wanted_pages(viewport) else {
            return Vec::new();
        };
        self.service.cancel_outside(wanted.clone(), self.render_zoom());

        let visible = self.layout.visible_pages(viewport);
        let lookups: Vec<(usize, PageLookup)> = visible
            .iter()
            .map(|&page| (page, self.service.get(self.key(page))))
            .collect();

        for page in wanted {
            if !visible.contains(&page) {
                let _ = self.service.get(self.key(page));
            }
        }
        lookups
    }

    /// Completion events still relevant to `viewport`; the rest are dropped
    pub fn relevant_events(&self, viewport: &ViewRect) -> Vec<RenderEvent> {
        let wanted = self.wanted_pages(viewport);
        let zoom_key = self.key(0).zoom_fixed;
        self.service
            .poll_events()
            .into_iter()
            .filter(|event| {
                let key = event.key();
                let keep = key.zoom_fixed == zoom_key
                    && wanted.as_ref().is_some_and(|w| w.contains(&key.page));
                if !keep {
                    log::trace!("Discarding event for page {}", key.page);
                }
                keep
            })
            .collect()
    }

    /// Export window ending at the current page
    pub fn export_range(&self, viewport: &ViewRect) -> Result<ExportRange, ExportError> {
        ExportRange::ending_at(
            self.current_page(viewport),
            self.max_extract_pages,
            self.source.page_count(),
        )
    }

    /// Scroll position as a fraction, for persisting
    #[must_use]
    pub fn scroll_fraction(&self, viewport_height: f32) -> f32 {
        self.layout.scroll_fraction(self.zoom.scroll_offset, viewport_height)
    }

    pub fn restore_scroll_fraction(&mut self, fraction: f32, viewport_height: f32) {
        self.zoom.scroll_offset = self.layout.offset_for_fraction(fraction, viewport_height);
    }
}
