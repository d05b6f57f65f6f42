//! Logging walkthrough for a typical listening session.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # Compact format with a custom filter
//! cargo run --example logging_demo -- compact "core_playback=trace"
//! ```

use bridge_traits::log::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::env;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_pii_redaction(true)
        .with_spans(true)
        .with_target(true);
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }
    init_logging(config)?;

    info!(format = ?format, "Logging initialized");

    load_catalog("https://music.example.com", "s3cret").await;
    download_album("kind-of-blue", 3).await;
    play_album("kind-of-blue", &["kob-1", "kob-2"]).await;

    Ok(())
}

#[instrument(skip(api_key))]
async fn load_catalog(base_url: &str, api_key: &str) {
    info!(
        api_key = %redact_if_sensitive("api_key", api_key),
        "Fetching albums.json"
    );
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    debug!(albums = 2, "Catalog manifest loaded");
}

#[instrument]
async fn download_album(album: &str, files: usize) {
    info!(total = files, "Downloading album for offline use");
    for done in 1..=files {
        let path = format!("/home/me/.cache/albumcast/albums/{album}/song-{done}");
        debug!(file = %strip_path(&path), downloaded = done, total = files, "Stored file");
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }
    info!("Album available offline");
}

#[instrument(skip(tracks))]
async fn play_album(album: &str, tracks: &[&str]) {
    for (index, track) in tracks.iter().enumerate() {
        info!(track = %track, index, offline = true, "Playing track");
        for status in ["loading", "loaded", "startingPlayer", "playing"] {
            debug!(track = %track, to = status, "Player status changed");
        }
    }
    warn!(error = "NotAllowedError", "Playback failed");
    info!("Playback stopped");
}
