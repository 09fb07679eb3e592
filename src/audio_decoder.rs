use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Fully decoded track in its native sample rate and channel layout
pub struct DecodedTrack {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
    /// Channel count of the interleaving
    pub channels: usize,
    /// Native sample rate in Hz
    pub sample_rate: u32,
}

impl DecodedTrack {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Resample and channel-map the track into the output device layout.
    ///
    /// Linear interpolation per channel, done once at load time so the
    /// output callback can index whole frames. A mono source is duplicated
    /// across output channels; extra source channels are dropped.
    pub fn render_for_output(&self, out_rate: u32, out_channels: usize) -> Vec<f32> {
        let in_frames = self.frames();
        if in_frames == 0 || out_channels == 0 || out_rate == 0 {
            return Vec::new();
        }

        let out_frames = if out_rate == self.sample_rate {
            in_frames
        } else {
            (in_frames as u64 * out_rate as u64 / self.sample_rate as u64) as usize
        };

        let step = self.sample_rate as f64 / out_rate as f64;
        let mut rendered = Vec::with_capacity(out_frames * out_channels);

        for frame in 0..out_frames {
            let src_pos = frame as f64 * step;
            let base = (src_pos as usize).min(in_frames - 1);
            let next = (base + 1).min(in_frames - 1);
            let frac = (src_pos - base as f64) as f32;

            for ch in 0..out_channels {
                let src_ch = ch.min(self.channels - 1);
                let a = self.samples[base * self.channels + src_ch];
                let b = self.samples[next * self.channels + src_ch];
                rendered.push(a + (b - a) * frac);
            }
        }

        rendered
    }
}

/// Decode an audio file to interleaved f32 PCM
pub fn decode_track(path: &Path) -> Result<DecodedTrack> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    let track = DecodedTrack {
        samples: all_samples,
        channels,
        sample_rate,
    };

    log::info!(
        "Decoded track: {} frames, {} channel(s), {}Hz, {:.1}s",
        track.frames(),
        track.channels,
        track.sample_rate,
        track.duration_secs()
    );

    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_track(frames: usize, channels: usize, sample_rate: u32) -> DecodedTrack {
        let mut samples = Vec::with_capacity(frames * channels);
        for frame in 0..frames {
            for _ in 0..channels {
                samples.push(frame as f32);
            }
        }
        DecodedTrack {
            samples,
            channels,
            sample_rate,
        }
    }

    #[test]
    fn render_is_identity_at_matching_rate_and_layout() {
        let track = ramp_track(100, 2, 44100);
        let rendered = track.render_for_output(44100, 2);
        assert_eq!(rendered, track.samples);
    }

    #[test]
    fn render_doubles_frames_at_double_rate() {
        let track = ramp_track(100, 1, 22050);
        let rendered = track.render_for_output(44100, 1);
        assert_eq!(rendered.len(), 200);
        // Interpolated midpoints sit between the source values
        assert!((rendered[1] - 0.5).abs() < 1e-6);
        assert!((rendered[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn render_duplicates_mono_across_output_channels() {
        let track = ramp_track(10, 1, 48000);
        let rendered = track.render_for_output(48000, 2);
        assert_eq!(rendered.len(), 20);
        for frame in rendered.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn duration_follows_frame_count() {
        let track = ramp_track(44100, 2, 44100);
        assert!((track.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn decodes_generated_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let path = std::env::temp_dir().join("stemscope_decode_test.wav");
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..8000 {
            let t = i as f32 / 8000.0;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((sample * i16::MAX as f32 * 0.5) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let track = decode_track(&path).unwrap();
        assert_eq!(track.sample_rate, 8000);
        assert_eq!(track.channels, 1);
        assert_eq!(track.frames(), 8000);
        assert!((track.duration_secs() - 1.0).abs() < 1e-3);

        let _ = std::fs::remove_file(&path);
    }
}
