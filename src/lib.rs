pub mod analyzer;
pub mod audio_decoder;
pub mod audio_player;
pub mod config;
pub mod download;
pub mod progress;
pub mod ui;

// Re-export key components for easier access
pub use analyzer::{AnalysisGraph, FrequencyFrame, SampleTap};
pub use audio_decoder::{decode_track, DecodedTrack};
pub use audio_player::{AudioPlayer, MediaEvent};
pub use config::read_app_config;
pub use download::{resolve_source, StemSource};
pub use progress::{progress_ratio, ProgressPair};
