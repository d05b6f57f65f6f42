//! # Host Bridge Traits
//!
//! Capabilities the playback core needs from its host platform.
//!
//! ## Overview
//!
//! The core never touches an audio device, a browser API or the file system
//! directly. Each capability is a trait here, implemented once per host
//! (`bridge-desktop` for native builds, a JS shim for the web).
//!
//! ## Traits
//!
//! ### Playback
//! - [`AudioOutput`](media::AudioOutput) / [`MediaElement`](media::MediaElement) - one audio resource per track
//! - [`MediaSession`](media_session::MediaSession) - lock-screen metadata and media keys
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - catalog fetches and track downloads
//! - [`FileSystemAccess`](storage::FileSystemAccess) - the offline cache directory
//! - [`SettingsStore`](storage::SettingsStore) - key-value flags, including offline presence
//! - [`ObjectUrlStore`](object_url::ObjectUrlStore) - local URLs for cached bytes
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Missing capabilities are reported when the core is configured, not on
//! first use:
//!
//! ```ignore
//! let audio = builder.audio_output.ok_or_else(|| CoreError::CapabilityMissing {
//!     capability: "AudioOutput".to_string(),
//!     message: "No audio output provided. Desktop: enable the desktop-shims feature.".to_string(),
//! })?;
//! ```
//!
//! ## Thread Safety
//!
//! Every trait is `Send + Sync`; the core shares implementations across
//! tokio tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod log;
pub mod media;
pub mod media_session;
pub mod object_url;
pub mod storage;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{AudioOutput, ListenerHandle, MediaElement, MediaEvent, MediaEventKind, MediaListener};
pub use media_session::{
    ActionDetails, ActionHandler, AlbumMetadata, Artwork, MediaAction, MediaSession,
    MetadataUpdate, PositionState,
};
pub use object_url::{ObjectBlob, ObjectUrlStore};
pub use storage::{FileSystemAccess, SettingsStore};
