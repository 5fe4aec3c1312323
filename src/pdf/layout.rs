//! Page column geometry for the viewer canvas
//!
//! Pages are stacked top to bottom at the current zoom with a fixed gap and
//! centered horizontally. All coordinates are canvas pixels with the origin
//! at the top-left of the first page's row.

use std::ops::RangeInclusive;

use super::types::PageSize;

/// Axis-aligned rectangle in canvas pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two corner points, in any order
    #[must_use]
    pub fn from_points(a: (f32, f32), b: (f32, f32)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: (a.0 - b.0).abs(),
            height: (a.1 - b.1).abs(),
        }
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[must_use]
    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Overlap test with touching edges counted as overlap
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Overlapping area, if it is non-empty
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 > x0 && y1 > y0 {
            Some(Self::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

/// Positions of every page at one zoom factor
#[derive(Clone, Debug, Default)]
pub struct PageLayout {
    rects: Vec<ViewRect>,
    zoom: f32,
    total_height: f32,
    max_width: f32,
}

impl PageLayout {
    #[must_use]
    pub fn new(sizes: &[PageSize], zoom: f32, padding: f32) -> Self {
        let max_width = sizes
            .iter()
            .map(|s| s.width_pt * zoom)
            .fold(0.0_f32, f32::max);

        let mut rects = Vec::with_capacity(sizes.len());
        let mut y = 0.0;
        for size in sizes {
            let (width, height) = size.scaled(zoom);
            rects.push(ViewRect::new((max_width - width) / 2.0, y, width, height));
            y += height + padding;
        }
        let total_height = if rects.is_empty() { 0.0 } else { y - padding };

        Self {
            rects,
            zoom,
            total_height,
            max_width,
        }
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.rects.len()
    }

    #[must_use]
    pub fn page_rect(&self, page: usize) -> Option<ViewRect> {
        self.rects.get(page).copied()
    }

    #[must_use]
    pub fn total_height(&self) -> f32 {
        self.total_height
    }

    #[must_use]
    pub fn max_width(&self) -> f32 {
        self.max_width
    }

    /// Pages overlapping `area`, in page order
    #[must_use]
    pub fn pages_in(&self, area: &ViewRect) -> Vec<usize> {
        self.rects
            .iter()
            .enumerate()
            .filter(|(_, rect)| rect.intersects(area))
            .map(|(page, _)| page)
            .collect()
    }

    #[must_use]
    pub fn visible_pages(&self, viewport: &ViewRect) -> Vec<usize> {
        self.pages_in(viewport)
    }

    /// First and last page overlapping the viewport
    #[must_use]
    pub fn visible_range(&self, viewport: &ViewRect) -> Option<RangeInclusive<usize>> {
        let pages = self.visible_pages(viewport);
        Some(*pages.first()?..=*pages.last()?)
    }

    /// Page treated as "current" for export.
    ///
    /// The highest-numbered page that is even partly visible wins. When no
    /// page is visible, the page whose center is nearest the viewport center.
    #[must_use]
    pub fn current_page(&self, viewport: &ViewRect) -> usize {
        if let Some(page) = self.pages_in(viewport).last() {
            return *page;
        }

        let center = viewport.center_y();
        self.rects
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (a.center_y() - center).abs();
                let db = (b.center_y() - center).abs();
                da.total_cmp(&db)
            })
            .map_or(0, |(page, _)| page)
    }

    /// Largest valid scroll offset for a viewport of the given height
    #[must_use]
    pub fn max_scroll(&self, viewport_height: f32) -> f32 {
        (self.total_height - viewport_height).max(0.0)
    }

    /// Scroll offset as a fraction of the scrollable range, in `[0, 1]`
    #[must_use]
    pub fn scroll_fraction(&self, offset: f32, viewport_height: f32) -> f32 {
        let max = self.max_scroll(viewport_height);
        if max <= 0.0 {
            0.0
        } else {
            (offset / max).clamp(0.0, 1.0)
        }
    }

    /// Inverse of [`Self::scroll_fraction`]
    #[must_use]
    pub fn offset_for_fraction(&self, fraction: f32, viewport_height: f32) -> f32 {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        fraction * self.max_scroll(viewport_height)
    }
}

/// Zoom at which `page` fills `viewport_width`
#[must_use]
pub fn fit_width_zoom(page: PageSize, viewport_width: f32) -> f32 {
    if page.width_pt <= 0.0 || viewport_width <= 1.0 {
        return super::DEFAULT_ZOOM;
    }
    let zoom = viewport_width / page.width_pt;
    if zoom.is_finite() && zoom > 0.0 {
        zoom
    } else {
        super::DEFAULT_ZOOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three 100x1000 pages with a 20px gap: tops at 0, 1020, 2040
    fn three_pages() -> PageLayout {
        let sizes = vec![PageSize::new(100.0, 1000.0); 3];
        PageLayout::new(&sizes, 1.0, 20.0)
    }

    #[test]
    fn pages_stack_with_padding() {
        let layout = three_pages();
        assert_eq!(layout.page_rect(1).map(|r| r.y), Some(1020.0));
        assert_eq!(layout.page_rect(2).map(|r| r.y), Some(2040.0));
        assert_eq!(layout.total_height(), 3040.0);
    }

    #[test]
    fn narrower_pages_are_centered() {
        let sizes = [PageSize::new(200.0, 100.0), PageSize::new(100.0, 100.0)];
        let layout = PageLayout::new(&sizes, 1.0, 10.0);
        assert_eq!(layout.page_rect(1).map(|r| r.x), Some(50.0));
        assert_eq!(layout.max_width(), 200.0);
    }

    #[test]
    fn current_page_when_next_page_top_is_visible() {
        let layout = three_pages();
        let viewport = ViewRect::new(0.0, 500.0, 100.0, 800.0);
        assert_eq!(layout.current_page(&viewport), 1);
    }

    #[test]
    fn current_page_prefers_partially_visible_later_page() {
        let layout = three_pages();
        let viewport = ViewRect::new(0.0, 1800.0, 100.0, 800.0);
        assert_eq!(layout.current_page(&viewport), 2);
    }

    #[test]
    fn current_page_falls_back_to_closest() {
        let layout = three_pages();
        let viewport = ViewRect::new(0.0, 5000.0, 100.0, 100.0);
        assert_eq!(layout.current_page(&viewport), 2);
        assert_eq!(PageLayout::default().current_page(&viewport), 0);
    }

    #[test]
    fn visible_range_spans_intersecting_pages() {
        let layout = three_pages();
        let viewport = ViewRect::new(0.0, 900.0, 100.0, 300.0);
        assert_eq!(layout.visible_range(&viewport), Some(0..=1));
        let past_end = ViewRect::new(0.0, 5000.0, 100.0, 100.0);
        assert_eq!(layout.visible_range(&past_end), None);
    }

    #[test]
    fn scroll_fraction_round_trip() {
        let layout = three_pages();
        let offset = layout.offset_for_fraction(0.5, 1040.0);
        assert_eq!(offset, 1000.0);
        assert_eq!(layout.scroll_fraction(offset, 1040.0), 0.5);
        assert_eq!(layout.scroll_fraction(10.0, 5000.0), 0.0);
        assert_eq!(layout.offset_for_fraction(f32::NAN, 1040.0), 0.0);
    }

    #[test]
    fn intersection_of_selection_and_page() {
        let page = ViewRect::new(0.0, 0.0, 100.0, 100.0);
        let sel = ViewRect::from_points((150.0, 150.0), (50.0, 60.0));
        assert_eq!(sel, ViewRect::new(50.0, 60.0, 100.0, 90.0));
        assert_eq!(page.intersection(&sel), Some(ViewRect::new(50.0, 60.0, 50.0, 40.0)));
        assert_eq!(page.intersection(&ViewRect::new(200.0, 0.0, 5.0, 5.0)), None);
    }

    #[test]
    fn fit_width_handles_degenerate_input() {
        assert_eq!(fit_width_zoom(PageSize::new(500.0, 700.0), 1000.0), 2.0);
        assert_eq!(fit_width_zoom(PageSize::new(0.0, 700.0), 1000.0), 1.0);
        assert_eq!(fit_width_zoom(PageSize::new(500.0, 700.0), 0.0), 1.0);
    }
}
