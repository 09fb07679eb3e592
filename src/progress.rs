/// Playback progress as a ratio in [0, 1], kept in two copies: `fast` is
/// read by the render loop every frame, `display` feeds the percentage
/// readout. Both are written together so they can never drift; keeping
/// them separate lets the readout be refreshed on its own cadence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressPair {
    fast: f32,
    display: f32,
}

impl ProgressPair {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile both copies to the same ratio
    pub fn set(&mut self, ratio: f32) {
        let ratio = ratio.clamp(0.0, 1.0);
        self.fast = ratio;
        self.display = ratio;
    }

    pub fn fast(&self) -> f32 {
        self.fast
    }

    pub fn display(&self) -> f32 {
        self.display
    }

    /// Display copy formatted for the readout, whole percent
    pub fn percent_label(&self) -> String {
        format!("{:.0}%", self.display as f64 * 100.0)
    }
}

/// Position over duration as a clamped ratio. Unknown duration (zero,
/// negative, NaN, infinite) yields zero so callers can render a parked
/// marker instead of special-casing.
pub fn progress_ratio(position_secs: f64, duration_secs: f64) -> f32 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 || !position_secs.is_finite() {
        return 0.0;
    }
    (position_secs / duration_secs).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_position_over_duration() {
        assert_eq!(progress_ratio(50.0, 200.0), 0.25);
        assert_eq!(progress_ratio(200.0, 200.0), 1.0);
    }

    #[test]
    fn ratio_clamps_out_of_range_positions() {
        assert_eq!(progress_ratio(-3.0, 10.0), 0.0);
        assert_eq!(progress_ratio(25.0, 10.0), 1.0);
    }

    #[test]
    fn unknown_duration_parks_at_zero() {
        assert_eq!(progress_ratio(5.0, 0.0), 0.0);
        assert_eq!(progress_ratio(5.0, -1.0), 0.0);
        assert_eq!(progress_ratio(5.0, f64::NAN), 0.0);
        assert_eq!(progress_ratio(5.0, f64::INFINITY), 0.0);
        assert_eq!(progress_ratio(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn set_updates_both_copies_together() {
        let mut progress = ProgressPair::new();
        progress.set(0.6);
        assert_eq!(progress.fast(), 0.6);
        assert_eq!(progress.display(), 0.6);

        progress.set(1.7);
        assert_eq!(progress.fast(), 1.0);
        assert_eq!(progress.percent_label(), "100%");
    }
}
