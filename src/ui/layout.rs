pub const WINDOW_MARGIN: u32 = 8; // Margin around the spectrum panel
pub const SPECTRUM_HEIGHT: u32 = 140; // Height of the spectrum panel
pub const TRANSPORT_GAP: u32 = 8; // Gap between the panel and the transport row
pub const TRANSPORT_BUTTON_SIZE: u32 = 24; // Play/pause button edge length
pub const READOUT_WIDTH: u32 = 96; // Reserved width for the progress readout

// Smallest window in which every viewport and scissor rect stays inside
// the surface, hover animation included
pub const MIN_WINDOW_WIDTH: u32 = 320;
pub const MIN_WINDOW_HEIGHT: u32 = 200;

pub struct UiLayout {
    pub window_width: u32,
    pub window_height: u32,
}

impl UiLayout {
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
        }
    }

    /// Update the window dimensions
    pub fn update_dimensions(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    /// The spectrum panel rectangle as (x, y, width, height)
    pub fn spectrum_region(&self) -> (u32, u32, u32, u32) {
        let width = self.window_width.saturating_sub(2 * WINDOW_MARGIN).max(1);
        let max_height = self
            .window_height
            .saturating_sub(2 * WINDOW_MARGIN)
            .max(1);
        (
            WINDOW_MARGIN,
            WINDOW_MARGIN,
            width,
            SPECTRUM_HEIGHT.min(max_height),
        )
    }

    /// Top-left corner of the play/pause button in the transport row
    pub fn transport_button_position(&self) -> (u32, u32) {
        let (_, panel_y, _, panel_height) = self.spectrum_region();
        (WINDOW_MARGIN, panel_y + panel_height + TRANSPORT_GAP)
    }

    /// Top-left corner of the progress readout, right-aligned in the
    /// transport row
    pub fn readout_position(&self) -> (f32, f32) {
        let (_, button_y) = self.transport_button_position();
        let x = self
            .window_width
            .saturating_sub(WINDOW_MARGIN + READOUT_WIDTH) as f32;
        (x, button_y as f32 + 4.0)
    }

    pub fn is_in_spectrum(&self, x: f64, y: f64) -> bool {
        let (rx, ry, rw, rh) = self.spectrum_region();
        x >= rx as f64
            && x <= (rx + rw) as f64
            && y >= ry as f64
            && y <= (ry + rh) as f64
    }

    /// Map a pointer x coordinate to a playback ratio over the spectrum
    /// panel. Clamped so drags that wander past either edge stay pinned
    /// to the track bounds; the vertical coordinate plays no part.
    pub fn seek_ratio(&self, x: f64) -> f32 {
        let (rx, _, rw, _) = self.spectrum_region();
        (((x - rx as f64) / rw as f64).clamp(0.0, 1.0)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_region_spans_width_minus_margins() {
        let layout = UiLayout::new(480, 200);
        assert_eq!(layout.spectrum_region(), (8, 8, 464, 140));
    }

    #[test]
    fn spectrum_region_survives_tiny_windows() {
        let layout = UiLayout::new(10, 10);
        let (_, _, w, h) = layout.spectrum_region();
        assert!(w >= 1);
        assert!(h >= 1);
    }

    #[test]
    fn seek_ratio_is_linear_within_the_panel() {
        let layout = UiLayout::new(480, 200);
        assert_eq!(layout.seek_ratio(8.0), 0.0);
        assert_eq!(layout.seek_ratio(8.0 + 232.0), 0.5);
        assert_eq!(layout.seek_ratio(8.0 + 464.0), 1.0);
    }

    #[test]
    fn seek_ratio_clamps_outside_the_panel() {
        let layout = UiLayout::new(480, 200);
        assert_eq!(layout.seek_ratio(-50.0), 0.0);
        assert_eq!(layout.seek_ratio(2000.0), 1.0);
    }

    #[test]
    fn transport_row_sits_below_the_panel() {
        let layout = UiLayout::new(480, 200);
        assert_eq!(layout.transport_button_position(), (8, 156));
    }
}
