//! Zoom and scroll state for the page canvas
//!
//! Manages the zoom factor and the vertical scroll offset of the continuous
//! page column.

/// Zoom and scroll state for PDF viewing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    /// Current zoom factor (1.0 = one pixel per PDF point)
    pub factor: f32,

    /// Vertical scroll offset in pixels from the top of the first page
    pub scroll_offset: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            factor: super::DEFAULT_ZOOM,
            scroll_offset: 0.0,
        }
    }
}

impl Zoom {
    /// Zoom in rate multiplier per step - 10%
    pub const ZOOM_IN_RATE: f32 = 1.1;
    /// Zoom out rate divisor per step - 10%
    pub const ZOOM_OUT_RATE: f32 = 1.1;
    /// Minimum allowed zoom factor
    pub const MIN_SCALE: f32 = 0.1;
    /// Maximum allowed zoom factor
    pub const MAX_SCALE: f32 = 8.0;

    #[must_use]
    pub fn new(factor: f32) -> Self {
        Self {
            factor: Self::clamp_factor(factor),
            scroll_offset: 0.0,
        }
    }

    /// Returns the current zoom factor
    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Zoom in by one step, keeping `anchor_y` (viewport-relative) fixed
    pub fn step_in(&mut self, anchor_y: f32) {
        self.set_factor(self.factor * Self::ZOOM_IN_RATE, anchor_y);
    }

    /// Zoom out by one step, keeping `anchor_y` (viewport-relative) fixed
    pub fn step_out(&mut self, anchor_y: f32) {
        self.set_factor(self.factor / Self::ZOOM_OUT_RATE, anchor_y);
    }

    /// Change zoom so the content under `anchor_y` stays under it
    pub fn set_factor(&mut self, factor: f32, anchor_y: f32) {
        let new_factor = Self::clamp_factor(factor);
        if new_factor == self.factor {
            return;
        }
        let content_y = self.scroll_offset + anchor_y;
        let ratio = new_factor / self.factor;
        self.scroll_offset = (content_y * ratio - anchor_y).max(0.0);
        self.factor = new_factor;
    }

    /// Scroll to `offset` pixels, staying within `[0, max_offset]`
    pub fn scroll_to(&mut self, offset: f32, max_offset: f32) {
        let offset = if offset.is_finite() { offset } else { 0.0 };
        self.scroll_offset = offset.clamp(0.0, max_offset.max(0.0));
    }

    /// Clamp factor to valid range, handling NaN/Inf
    #[must_use]
    pub fn clamp_factor(factor: f32) -> f32 {
        if !factor.is_finite() {
            super::DEFAULT_ZOOM
        } else {
            factor.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_symmetric() {
        let mut zoom = Zoom::default();
        zoom.step_in(0.0);
        assert!((zoom.factor() - 1.1).abs() < 1e-6);
        zoom.step_out(0.0);
        assert!((zoom.factor() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn factor_is_clamped() {
        let mut zoom = Zoom::new(0.1);
        zoom.step_out(0.0);
        assert_eq!(zoom.factor(), Zoom::MIN_SCALE);

        assert_eq!(Zoom::new(100.0).factor(), Zoom::MAX_SCALE);
        assert_eq!(Zoom::clamp_factor(f32::NAN), 1.0);
    }

    #[test]
    fn zoom_keeps_anchor_content_in_place() {
        let mut zoom = Zoom::new(1.0);
        zoom.scroll_offset = 100.0;
        zoom.set_factor(2.0, 50.0);
        // content at y=150 is now at 300; anchor stays at viewport y=50
        assert!((zoom.scroll_offset - 250.0).abs() < 1e-4);
    }

    #[test]
    fn scroll_is_bounded() {
        let mut zoom = Zoom::default();
        zoom.scroll_to(-10.0, 500.0);
        assert_eq!(zoom.scroll_offset, 0.0);
        zoom.scroll_to(900.0, 500.0);
        assert_eq!(zoom.scroll_offset, 500.0);
        zoom.scroll_to(f32::NAN, 500.0);
        assert_eq!(zoom.scroll_offset, 0.0);
    }
}
