mod analyzer;
mod audio_decoder;
mod audio_player;
mod config;
mod download;
mod progress;
mod ui;

use anyhow::{Context, Result};

use audio_player::AudioPlayer;
use config::read_app_config;
use download::StemSource;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let app_config = read_app_config();

    let source = std::env::args()
        .nth(1)
        .context("Usage: stemscope <path-or-url>")?;

    log::info!("Resolving stem source: {}", source);
    let resolved = download::resolve_source(&source, &app_config).await;

    // Playback failures all land in the same place: the window comes up
    // in its disabled mode instead of aborting
    let (player, media_rx) = match resolved {
        StemSource::Ready { path } => match audio_decoder::decode_track(&path) {
            Ok(track) => match AudioPlayer::load(&track, app_config.playback.tick_interval_ms) {
                Ok(player) => {
                    let rx = player.subscribe();
                    (Some(player), Some(rx))
                }
                Err(e) => {
                    log::warn!("Audio output unavailable: {e:#}");
                    (None, None)
                }
            },
            Err(e) => {
                log::warn!("Failed to decode {}: {e:#}", path.display());
                (None, None)
            }
        },
        StemSource::Unavailable { reason } => {
            log::warn!("Stem unavailable: {}", reason);
            (None, None)
        }
    };

    ui::run(player, media_rx, &app_config)
}
