//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::log::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// The global subscriber can be installed once per process, so everything
// depending on it lives in this one test.
#[test]
fn test_global_logging_forwards_to_sink() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::debug!(target: "core_playback::sequencer", index = 2u64, "Playing track");
    tracing::trace!(target: "core_playback::sequencer", "filtered out");
    tracing::info!(target: "some_dependency", "outside the workspace filter");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Playing track");
        assert_eq!(entries[0].fields.get("index"), Some(&"2".to_string()));
        assert_eq!(entries[0].level, LogLevel::Debug);
    }

    let second = init_logging(LoggingConfig::default());
    assert!(second.is_err());
}

#[test]
fn test_pii_redaction_secrets() {
    assert_eq!(redact_if_sensitive("api_key", "abcdef"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("authorization", "Bearer x"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "hunter2"), "[REDACTED]");
}

#[test]
fn test_pii_redaction_emails() {
    let redacted = redact_if_sensitive("owner", "user@example.com");
    assert!(redacted.starts_with('u'));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_pii_redaction_normal_values() {
    assert_eq!(redact_if_sensitive("track_id", "12345"), "12345");
    assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
    assert_eq!(
        redact_if_sensitive("url", "https://cdn.example/audio/1.mp3"),
        "https://cdn.example/audio/1.mp3"
    );
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/home/user/.cache/albumcast/albums/a1/song-3"), "song-3");
    assert_eq!(strip_path("C:\\Users\\John\\AppData\\cover.jpg"), "cover.jpg");
    assert_eq!(strip_path("filename.txt"), "filename.txt");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}
