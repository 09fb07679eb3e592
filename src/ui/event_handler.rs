use winit::dpi::PhysicalPosition;

use super::layout::UiLayout;

/// Scrub state for the spectrum panel. A press inside the panel starts a
/// drag; every later horizontal move re-seeks; release, or the pointer
/// leaving the window, ends the drag unconditionally regardless of what
/// the last seek did.
pub struct SeekGesture {
    dragging: bool,
}

impl SeekGesture {
    pub fn new() -> Self {
        Self { dragging: false }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Pointer press. Starts the drag and yields the first seek ratio
    /// when the press lands inside the panel.
    pub fn press(&mut self, layout: &UiLayout, x: f64, y: f64) -> Option<f32> {
        if layout.is_in_spectrum(x, y) {
            self.dragging = true;
            Some(layout.seek_ratio(x))
        } else {
            None
        }
    }

    /// Pointer move. Yields a seek ratio only mid-drag; the vertical
    /// coordinate plays no part, so the drag survives leaving the panel.
    pub fn drag(&mut self, layout: &UiLayout, x: f64) -> Option<f32> {
        if self.dragging {
            Some(layout.seek_ratio(x))
        } else {
            None
        }
    }

    /// Unconditional end of the gesture
    pub fn release(&mut self) {
        self.dragging = false;
    }
}

/// Pointer state shared across window events
pub struct EventHandler {
    pub cursor_position: Option<PhysicalPosition<f64>>,
    pub gesture: SeekGesture,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            cursor_position: None,
            gesture: SeekGesture::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> UiLayout {
        // Panel spans (8, 8) to (472, 148)
        UiLayout::new(480, 200)
    }

    #[test]
    fn press_inside_panel_starts_drag_and_seeks() {
        let mut gesture = SeekGesture::new();
        let ratio = gesture.press(&layout(), 8.0 + 232.0, 50.0);
        assert_eq!(ratio, Some(0.5));
        assert!(gesture.is_dragging());
    }

    #[test]
    fn press_outside_panel_is_ignored() {
        let mut gesture = SeekGesture::new();
        assert_eq!(gesture.press(&layout(), 240.0, 180.0), None);
        assert!(!gesture.is_dragging());
    }

    #[test]
    fn drag_tracks_horizontal_movement_and_clamps() {
        let mut gesture = SeekGesture::new();
        gesture.press(&layout(), 100.0, 50.0);

        assert_eq!(gesture.drag(&layout(), 8.0 + 116.0), Some(0.25));
        // Wandering past either edge pins to the track bounds
        assert_eq!(gesture.drag(&layout(), -400.0), Some(0.0));
        assert_eq!(gesture.drag(&layout(), 4000.0), Some(1.0));
    }

    #[test]
    fn drag_without_press_yields_nothing() {
        let mut gesture = SeekGesture::new();
        assert_eq!(gesture.drag(&layout(), 100.0), None);
    }

    #[test]
    fn release_always_ends_the_gesture() {
        let mut gesture = SeekGesture::new();
        gesture.press(&layout(), 100.0, 50.0);
        gesture.release();
        assert!(!gesture.is_dragging());
        assert_eq!(gesture.drag(&layout(), 100.0), None);

        // Releasing with no drag in flight stays quiet
        gesture.release();
        assert!(!gesture.is_dragging());
    }
}
