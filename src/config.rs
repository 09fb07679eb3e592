use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Window dimensions for the fixed-size visualizer window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Logical width of the window in pixels
    pub width: u32,
    /// Logical height of the window in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 200,
        }
    }
}

/// Stem byte cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Override for the cache directory. When unset the cache lives under
    /// ~/.cache/stemscope/stems
    pub dir: Option<PathBuf>,
}

/// Remote fetch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Bearer token passed through on stem fetch requests when present
    pub bearer_token: Option<String>,
}

/// Playback behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Start playing immediately once the track is loaded
    pub autoplay: bool,
    /// Period of the progress ticker in milliseconds. Controls how often
    /// time updates reach the UI, not the redraw rate.
    pub tick_interval_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            tick_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Window dimensions
    pub window: WindowConfig,
    /// Stem byte cache settings
    pub cache: CacheConfig,
    /// Remote fetch settings
    pub remote: RemoteConfig,
    /// Playback behavior
    pub playback: PlaybackConfig,
}

/// Helper function to read the application configuration
pub fn read_app_config() -> AppConfig {
    match std::fs::read_to_string("config.json") {
        Ok(config_str) => match serde_json::from_str(&config_str) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to parse config.json: {}. Using default configuration.", e);
                AppConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read config.json: {}. Using default configuration.", e);
            AppConfig::default()
        }
    }
}
