use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::analyzer::SampleTap;
use crate::audio_decoder::DecodedTrack;

/// Transport lifecycle signals, one per media element event the UI
/// consumes. Payload-free; handlers read position/duration off the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    LoadedMetadata,
    Play,
    Pause,
    TimeUpdate,
    Ended,
}

/// State shared between the UI thread, the output callback, and the
/// progress ticker
struct PlayerShared {
    /// Current playback position in output frames
    position: AtomicUsize,
    /// The callback produces track frames while set, silence otherwise
    playing: AtomicBool,
    /// Set by the callback when the last frame has been played
    ended: AtomicBool,
    /// Stops the progress ticker on teardown
    closed: AtomicBool,
    /// Recently played mono samples for the analysis graph
    tap: Arc<RwLock<SampleTap>>,
}

/// Playback transport over a decoded track: one cpal output stream, atomic
/// position, and a broadcast of [`MediaEvent`]s.
pub struct AudioPlayer {
    stream: cpal::Stream,
    shared: Arc<PlayerShared>,
    events: broadcast::Sender<MediaEvent>,
    out_rate: u32,
    total_frames: usize,
    closed: bool,
}

impl AudioPlayer {
    /// Build an output stream over a decoded track. The stream starts
    /// suspended; [`AudioPlayer::play`] resumes it and starts the event
    /// flow. Duration is known from this point on.
    pub fn load(track: &DecodedTrack, tick_interval_ms: u64) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No audio output device found")?;
        let supported = device
            .default_output_config()
            .context("Failed to get default output config")?;

        if supported.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!(
                "Unsupported output sample format: {:?}",
                supported.sample_format()
            );
        }

        let out_rate = supported.sample_rate().0;
        let out_channels = supported.channels() as usize;
        log::info!(
            "Audio output: {} @ {}Hz, {} channel(s)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            out_rate,
            out_channels
        );

        let rendered: Arc<Vec<f32>> = Arc::new(track.render_for_output(out_rate, out_channels));
        let total_frames = rendered.len() / out_channels.max(1);

        let shared = Arc::new(PlayerShared {
            position: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            tap: Arc::new(RwLock::new(SampleTap::new())),
        });

        let stream_config: cpal::StreamConfig = supported.into();
        let callback_shared = shared.clone();
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, &rendered, out_channels, total_frames, &callback_shared);
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )
            .context("Failed to build audio output stream")?;

        // Some backends start streams eagerly; suspend until play()
        if let Err(e) = stream.pause() {
            log::warn!("Output stream does not support suspension: {}", e);
        }

        let (events, _) = broadcast::channel(32);

        let player = Self {
            stream,
            shared,
            events,
            out_rate,
            total_frames,
            closed: false,
        };
        player.spawn_progress_ticker(tick_interval_ms);

        Ok(player)
    }

    /// Subscribe to transport lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }

    /// Handle to the sample tap shared with the analysis graph
    pub fn tap(&self) -> Arc<RwLock<SampleTap>> {
        self.shared.tap.clone()
    }

    /// Resume the suspended output stream and begin producing frames. An
    /// ended track restarts from the beginning, matching media element
    /// replay behavior.
    pub fn play(&self) -> Result<()> {
        if self.closed {
            return Err(anyhow::anyhow!("player is closed"));
        }
        if self.shared.ended.swap(false, Ordering::Relaxed) {
            self.shared.position.store(0, Ordering::Relaxed);
        }
        self.stream
            .play()
            .context("Failed to resume output stream")?;
        self.shared.playing.store(true, Ordering::Relaxed);
        let _ = self.events.send(MediaEvent::Play);
        Ok(())
    }

    /// Stop producing frames. The stream stays warm so the next play
    /// resumes without re-negotiating the device.
    pub fn pause(&self) {
        self.shared.playing.store(false, Ordering::Relaxed);
        let _ = self.events.send(MediaEvent::Pause);
    }

    /// Seek to an absolute position in seconds, clamped to the track
    /// bounds. Seeking an ended track off its end re-arms it (paused).
    pub fn seek_to(&self, secs: f64) -> Result<()> {
        let duration = self.duration_secs();
        if !duration.is_finite() || duration <= 0.0 {
            // Metadata unknown: no-op by contract
            return Ok(());
        }

        let clamped = secs.clamp(0.0, duration);
        let frame = ((clamped / duration) * self.total_frames as f64) as usize;
        let frame = frame.min(self.total_frames);

        self.shared.position.store(frame, Ordering::Relaxed);
        if frame < self.total_frames {
            self.shared.ended.store(false, Ordering::Relaxed);
        }
        let _ = self.events.send(MediaEvent::TimeUpdate);
        Ok(())
    }

    pub fn position_secs(&self) -> f64 {
        self.shared.position.load(Ordering::Relaxed) as f64 / self.out_rate as f64
    }

    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / self.out_rate as f64
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// Idempotent teardown: suspends the output stream and stops the
    /// ticker. Failures are logged and swallowed; repeat calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            log::debug!("Audio player already closed");
            return;
        }
        self.closed = true;
        self.shared.closed.store(true, Ordering::Relaxed);
        self.shared.playing.store(false, Ordering::Relaxed);
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to suspend output stream during teardown: {}", e);
        }
    }

    /// Periodic reporter turning atomic playback state into events:
    /// LoadedMetadata once, TimeUpdate while playing, exactly one Ended
    /// per end-of-track.
    fn spawn_progress_ticker(&self, tick_interval_ms: u64) {
        let shared = self.shared.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                tick_interval_ms.max(1),
            ));
            let _ = events.send(MediaEvent::LoadedMetadata);
            let mut was_ended = false;

            loop {
                interval.tick().await;
                if shared.closed.load(Ordering::Relaxed) {
                    break;
                }

                let ended = shared.ended.load(Ordering::Relaxed);
                if ended && !was_ended {
                    let _ = events.send(MediaEvent::Ended);
                }
                was_ended = ended;

                if shared.playing.load(Ordering::Relaxed) {
                    let _ = events.send(MediaEvent::TimeUpdate);
                }
            }
        });
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fill one output buffer from the rendered track. Runs on the audio
/// callback thread; must never block, so the tap push is a try-write that
/// skips under contention (tap data is cosmetic).
fn fill_output(
    data: &mut [f32],
    rendered: &[f32],
    channels: usize,
    total_frames: usize,
    shared: &PlayerShared,
) {
    if !shared.playing.load(Ordering::Relaxed) {
        data.fill(0.0);
        return;
    }

    let mut pos = shared.position.load(Ordering::Relaxed);
    let frames_out = data.len() / channels.max(1);
    let mut mono = Vec::with_capacity(frames_out);

    for frame in 0..frames_out {
        if pos >= total_frames {
            for ch in 0..channels {
                data[frame * channels + ch] = 0.0;
            }
            continue;
        }

        let mut acc = 0.0;
        for ch in 0..channels {
            let sample = rendered[pos * channels + ch];
            data[frame * channels + ch] = sample;
            acc += sample;
        }
        mono.push(acc / channels as f32);
        pos += 1;
    }

    let reached_end = pos >= total_frames;
    shared.position.store(pos.min(total_frames), Ordering::Relaxed);

    if reached_end {
        shared.playing.store(false, Ordering::Relaxed);
        shared.ended.store(true, Ordering::Relaxed);
    }

    if !mono.is_empty() {
        if let Some(mut tap) = shared.tap.try_write() {
            tap.push(&mono);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_at(position: usize, playing: bool) -> Arc<PlayerShared> {
        Arc::new(PlayerShared {
            position: AtomicUsize::new(position),
            playing: AtomicBool::new(playing),
            ended: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            tap: Arc::new(RwLock::new(SampleTap::new())),
        })
    }

    fn stereo_ramp(frames: usize) -> Vec<f32> {
        let mut samples = Vec::with_capacity(frames * 2);
        for frame in 0..frames {
            samples.push(frame as f32);
            samples.push(frame as f32 + 100.0);
        }
        samples
    }

    #[test]
    fn paused_output_is_silence() {
        let shared = shared_at(5, false);
        let rendered = stereo_ramp(16);
        let mut data = vec![7.0; 8];

        fill_output(&mut data, &rendered, 2, 16, &shared);

        assert!(data.iter().all(|&s| s == 0.0));
        assert_eq!(shared.position.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn playing_output_copies_frames_and_taps_mono() {
        let shared = shared_at(0, true);
        let rendered = stereo_ramp(16);
        let mut data = vec![0.0; 8];

        fill_output(&mut data, &rendered, 2, 16, &shared);

        // Four stereo frames copied in order
        assert_eq!(data, vec![0.0, 100.0, 1.0, 101.0, 2.0, 102.0, 3.0, 103.0]);
        assert_eq!(shared.position.load(Ordering::Relaxed), 4);

        // The tap received the mono mix of those frames
        let mut tapped = [0.0; 4];
        shared.tap.read().latest(&mut tapped);
        assert_eq!(tapped, [50.0, 51.0, 52.0, 53.0]);
    }

    #[test]
    fn end_of_track_sets_ended_and_stops_playing() {
        let shared = shared_at(14, true);
        let rendered = stereo_ramp(16);
        let mut data = vec![9.0; 8];

        fill_output(&mut data, &rendered, 2, 16, &shared);

        // Two real frames, then silence
        assert_eq!(data[0], 14.0);
        assert_eq!(data[2], 15.0);
        assert_eq!(&data[4..], &[0.0, 0.0, 0.0, 0.0]);

        assert_eq!(shared.position.load(Ordering::Relaxed), 16);
        assert!(shared.ended.load(Ordering::Relaxed));
        assert!(!shared.playing.load(Ordering::Relaxed));
    }
}
