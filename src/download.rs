use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::AppConfig;

/// Minimum plausible size for a cached stem file. Anything smaller is
/// treated as a truncated or empty download and refetched.
const MIN_STEM_BYTES: u64 = 1_000;

/// Fallback cache file name for URLs with no usable path segment
const DEFAULT_STEM_FILENAME: &str = "stem.bin";

/// Outcome of resolving an AudioSource reference
#[derive(Debug, Clone)]
pub enum StemSource {
    /// Playable local bytes; the visualizer may build its analysis graph
    Ready { path: PathBuf },
    /// The source could not be fetched. The UI degrades to the
    /// non-interactive placeholder instead of exiting.
    Unavailable { reason: String },
}

impl StemSource {
    pub fn visualizer_ready(&self) -> bool {
        matches!(self, StemSource::Ready { .. })
    }
}

/// Get the stem cache directory path, creating it if needed
fn stem_cache_dir(config: &AppConfig) -> Result<PathBuf> {
    let cache_dir = match &config.cache.dir {
        Some(dir) => dir.clone(),
        None => {
            let home_dir = std::env::var("HOME").context("Failed to get HOME directory")?;
            PathBuf::from(format!("{}/.cache/stemscope/stems", home_dir))
        }
    };

    if !cache_dir.exists() {
        log::info!("Creating stem cache directory: {:?}", cache_dir);
        fs::create_dir_all(&cache_dir).context("Failed to create stem cache directory")?;
    }

    Ok(cache_dir)
}

/// Derive the cache file name from the last path segment of a URL,
/// with query and fragment stripped
fn cache_file_name(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_STEM_FILENAME)
        .to_string()
}

/// Checks if a cached stem file exists and is plausibly complete
fn is_cached_stem_valid(stem_path: &Path) -> bool {
    if !stem_path.exists() {
        return false;
    }

    match fs::metadata(stem_path) {
        Ok(metadata) => metadata.len() > MIN_STEM_BYTES,
        Err(_) => false,
    }
}

/// Resolve an AudioSource reference into playable local bytes.
///
/// Local paths pass through untouched. Remote URLs go through the stem
/// cache, fetching on a miss. Fetch failures are never fatal and never
/// retried; they resolve to [`StemSource::Unavailable`], which callers map
/// to the disabled placeholder state.
pub async fn resolve_source(source: &str, config: &AppConfig) -> StemSource {
    let local_path = Path::new(source);
    if local_path.exists() {
        return StemSource::Ready {
            path: local_path.to_path_buf(),
        };
    }

    if !source.starts_with("http://") && !source.starts_with("https://") {
        return StemSource::Unavailable {
            reason: format!("no such file: {}", source),
        };
    }

    match fetch_stem(source, config).await {
        Ok(path) => StemSource::Ready { path },
        Err(e) => {
            log::warn!("Stem fetch failed, visualizer will run disabled: {:#}", e);
            StemSource::Unavailable {
                reason: format!("{:#}", e),
            }
        }
    }
}

/// Fetch a remote stem into the cache, reusing a previous download when
/// a plausibly complete file is already present
async fn fetch_stem(url: &str, config: &AppConfig) -> Result<PathBuf> {
    let cache_dir = stem_cache_dir(config)?;
    let stem_path = cache_dir.join(cache_file_name(url));

    if is_cached_stem_valid(&stem_path) {
        log::info!("Using cached stem at {:?}", stem_path);
        return Ok(stem_path);
    }

    download_file(url, &stem_path, config.remote.bearer_token.as_deref()).await?;

    if !is_cached_stem_valid(&stem_path) {
        return Err(anyhow::anyhow!("Downloaded stem is empty or truncated"));
    }

    Ok(stem_path)
}

/// Download a file from a URL and save it to the specified path
pub async fn download_file(
    url: &str,
    output_path: &Path,
    bearer_token: Option<&str>,
) -> Result<()> {
    log::info!("Downloading stem from: {}", url);

    // Create parent directories if they don't exist
    if let Some(parent) = output_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    // Download to a temporary file and rename only on completion, so an
    // interrupted fetch never looks like a cached stem
    let temp_path = output_path.with_extension("downloading");

    let client = reqwest::Client::new();
    let mut request = client.get(url);
    if let Some(token) = bearer_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .context(format!("Failed to download stem from {}", url))?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "Failed to download stem, status: {}",
            response.status()
        ));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .context(format!("Failed to create file at {:?}", temp_path))?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_logged_decile: u64 = 0;

    use futures_util::StreamExt;
    while let Some(item) = stream.next().await {
        let chunk = item.context("Error while downloading stem")?;
        file.write_all(&chunk).await?;

        downloaded += chunk.len() as u64;
        if total_size > 0 {
            let decile = downloaded * 10 / total_size;
            if decile > last_logged_decile {
                last_logged_decile = decile;
                log::info!(
                    "Downloading... {}% ({}/{} bytes)",
                    decile * 10,
                    downloaded,
                    total_size
                );
            }
        }
    }

    log::info!("Download complete: {} bytes", downloaded);

    // Close the file before renaming
    drop(file);

    fs::rename(&temp_path, output_path).context(format!(
        "Failed to rename downloaded stem from {:?} to {:?}",
        temp_path, output_path
    ))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_name_uses_last_path_segment() {
        assert_eq!(
            cache_file_name("https://stems.example.com/jobs/42/vocals.mp3"),
            "vocals.mp3"
        );
    }

    #[test]
    fn cache_name_strips_query_and_fragment() {
        assert_eq!(
            cache_file_name("https://stems.example.com/drums.flac?sig=abc123#t=0"),
            "drums.flac"
        );
    }

    #[test]
    fn cache_name_falls_back_for_bare_directory_urls() {
        assert_eq!(cache_file_name("https://stems.example.com/"), "stem.bin");
    }
}
