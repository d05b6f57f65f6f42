//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SettingsStore` using a SQLite key-value table
//! - `ObjectUrlStore` keeping blobs in memory
//! - `AudioOutput` as a headless, clock-driven element probed with Symphonia
//! - `MediaSession` logging through `tracing`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{MemoryObjectUrlStore, ReqwestHttpClient, TokioFileSystem};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http = Arc::new(ReqwestHttpClient::new()?);
//!     let fs = Arc::new(TokioFileSystem::new());
//!     let urls = Arc::new(MemoryObjectUrlStore::new());
//!     // Hand these to CoreConfig::builder()
//!     Ok(())
//! }
//! ```

mod audio;
mod filesystem;
mod http;
mod media_session;
mod object_urls;
mod settings;

pub use audio::{probe_duration, HeadlessAudioOutput, HeadlessElement};
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use media_session::TracingMediaSession;
pub use object_urls::MemoryObjectUrlStore;
pub use settings::SqliteSettingsStore;
