use parking_lot::RwLock;
use rustfft::{num_complex::Complex, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of time-domain samples consumed per transform
pub const TRANSFORM_SIZE: usize = 256;
/// Number of frequency bins produced per frame
pub const BIN_COUNT: usize = TRANSFORM_SIZE / 2;

/// dB range mapped onto the 0..=255 byte magnitudes
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Time-smoothing factor between consecutive frames. Closer to 1.0 keeps
/// more of the previous frame.
const SMOOTHING: f32 = 0.8;

/// Capacity of the sample tap ring
const TAP_CAPACITY: usize = 2048;

/// Ring of recently played mono samples. The output callback pushes into
/// it under a try-write (skipping on contention); the analysis graph reads
/// the newest window out of it on the UI thread.
pub struct SampleTap {
    ring: VecDeque<f32>,
}

impl SampleTap {
    pub fn new() -> Self {
        Self {
            ring: VecDeque::with_capacity(TAP_CAPACITY),
        }
    }

    /// Append played samples, dropping the oldest beyond capacity
    pub fn push(&mut self, samples: &[f32]) {
        for &sample in samples {
            if self.ring.len() == TAP_CAPACITY {
                self.ring.pop_front();
            }
            self.ring.push_back(sample);
        }
    }

    /// Copy the newest `out.len()` samples into `out`, zero-padding the
    /// front when fewer are available
    pub fn latest(&self, out: &mut [f32]) {
        out.fill(0.0);
        let have = self.ring.len().min(out.len());
        let skip = self.ring.len() - have;
        let pad = out.len() - have;
        for (dst, src) in out[pad..].iter_mut().zip(self.ring.iter().skip(skip)) {
            *dst = *src;
        }
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for SampleTap {
    fn default() -> Self {
        Self::new()
    }
}

/// One snapshot of per-bin byte magnitudes consumed by one draw call.
/// Overwritten every tick, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyFrame {
    pub bins: [u8; BIN_COUNT],
}

impl FrequencyFrame {
    pub fn silent() -> Self {
        Self {
            bins: [0; BIN_COUNT],
        }
    }
}

/// Frequency-analysis state bound to one audio source: transform plan,
/// window coefficients, and the tap into the playback output. Owned by
/// exactly one visualizer instance and torn down with it.
pub struct AnalysisGraph {
    tap: Arc<RwLock<SampleTap>>,
    fft: Arc<dyn rustfft::Fft<f32>>,
    fft_buffer: Vec<Complex<f32>>,
    window: Vec<f32>,
    time_samples: [f32; TRANSFORM_SIZE],
    smoothed: [f32; BIN_COUNT],
    closed: bool,
}

impl AnalysisGraph {
    /// Build a graph over the player's sample tap
    pub fn new(tap: Arc<RwLock<SampleTap>>) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(TRANSFORM_SIZE);

        // Hann window, precomputed once: 0.5 * (1 - cos(2pi * i / (N-1)))
        let window = (0..TRANSFORM_SIZE)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f32::consts::PI * i as f32 / (TRANSFORM_SIZE - 1) as f32).cos())
            })
            .collect();

        Self {
            tap,
            fft,
            fft_buffer: vec![Complex { re: 0.0, im: 0.0 }; TRANSFORM_SIZE],
            window,
            time_samples: [0.0; TRANSFORM_SIZE],
            smoothed: [0.0; BIN_COUNT],
            closed: false,
        }
    }

    /// Compute the next frame from the newest tapped samples. A closed
    /// graph yields silent frames.
    pub fn process(&mut self) -> FrequencyFrame {
        if self.closed {
            return FrequencyFrame::silent();
        }

        self.tap.read().latest(&mut self.time_samples);

        for i in 0..TRANSFORM_SIZE {
            self.fft_buffer[i] = Complex {
                re: self.time_samples[i] * self.window[i],
                im: 0.0,
            };
        }
        self.fft.process(&mut self.fft_buffer);

        let scale = 2.0 / TRANSFORM_SIZE as f32;
        let mut frame = FrequencyFrame::silent();
        for (i, bin) in frame.bins.iter_mut().enumerate() {
            let magnitude = self.fft_buffer[i].norm() * scale;
            let smoothed = SMOOTHING * self.smoothed[i] + (1.0 - SMOOTHING) * magnitude;
            self.smoothed[i] = smoothed;
            *bin = byte_magnitude(smoothed);
        }

        frame
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Idempotent teardown: detach from the tap and mark the graph closed.
    /// Repeat calls are no-ops; problems are logged, never surfaced, since
    /// cleanup hygiene cannot affect playback.
    pub fn close(&mut self) {
        if self.closed {
            log::debug!("Analysis graph already closed");
            return;
        }
        self.closed = true;
        self.smoothed = [0.0; BIN_COUNT];

        if let Some(mut tap) = self.tap.try_write() {
            tap.clear();
        } else {
            log::warn!("Sample tap busy during teardown, leaving residual samples");
        }
    }
}

impl Drop for AnalysisGraph {
    fn drop(&mut self) {
        self.close();
    }
}

/// Map a normalized linear magnitude onto 0..=255 over [MIN_DB, MAX_DB]
fn byte_magnitude(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DB) / (MAX_DB - MIN_DB);
    (scaled.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_tap() -> Arc<RwLock<SampleTap>> {
        Arc::new(RwLock::new(SampleTap::new()))
    }

    #[test]
    fn tap_keeps_only_the_newest_samples() {
        let mut tap = SampleTap::new();
        tap.push(&vec![1.0; TAP_CAPACITY]);
        tap.push(&[2.0, 2.0]);
        assert_eq!(tap.len(), TAP_CAPACITY);

        let mut out = [0.0; 4];
        tap.latest(&mut out);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn tap_zero_pads_when_underfilled() {
        let mut tap = SampleTap::new();
        tap.push(&[3.0, 4.0]);

        let mut out = [9.0; 4];
        tap.latest(&mut out);
        assert_eq!(out, [0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn byte_magnitude_maps_db_range() {
        assert_eq!(byte_magnitude(0.0), 0);
        // Quieter than the floor clamps to zero
        assert_eq!(byte_magnitude(1e-6), 0);
        // Louder than the ceiling saturates
        assert_eq!(byte_magnitude(1.0), 255);
        // -65 dB sits halfway between -100 and -30
        let mid = byte_magnitude(10f32.powf(-65.0 / 20.0));
        assert!((127..=129).contains(&mid), "got {}", mid);
    }

    #[test]
    fn silent_tap_yields_silent_frame() {
        let mut graph = AnalysisGraph::new(shared_tap());
        let frame = graph.process();
        assert_eq!(frame, FrequencyFrame::silent());
    }

    #[test]
    fn sine_peaks_in_its_own_bin() {
        let tap = shared_tap();
        // 16 cycles per transform window puts the peak in bin 16
        let samples: Vec<f32> = (0..TRANSFORM_SIZE)
            .map(|n| (2.0 * std::f32::consts::PI * 16.0 * n as f32 / TRANSFORM_SIZE as f32).sin())
            .collect();
        tap.write().push(&samples);

        let mut graph = AnalysisGraph::new(tap);
        let frame = graph.process();

        assert!(frame.bins[16] > 0);
        assert!(frame.bins[16] >= frame.bins[100]);
        assert!(frame.bins[16] >= frame.bins[40]);
    }

    #[test]
    fn close_is_idempotent_and_silences_processing() {
        let mut graph = AnalysisGraph::new(shared_tap());
        graph.close();
        graph.close();
        assert!(graph.is_closed());
        assert_eq!(graph.process(), FrequencyFrame::silent());
    }
}
