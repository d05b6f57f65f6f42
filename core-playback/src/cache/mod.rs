//! # Offline Cache Module
//!
//! Keeps whole albums on local storage for playback without network access.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     OfflineCacheResolver               │
//! │  - resolve_track_url()                 │
//! │  - download_album()                    │
//! │  - delete_album()                      │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> SettingsStore (presence flag)
//!          ├──> FileSystemAccess (album files)
//!          ├──> ObjectUrlStore (local URLs)
//!          └──> download worker ──> CacheFileWriter (direct | streaming)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::OfflineCacheResolver;
//!
//! # async fn example(resolver: &OfflineCacheResolver, album: &core_library::Album) -> core_playback::Result<()> {
//! resolver
//!     .download_album(album, |p| println!("{}/{}", p.downloaded, p.total))
//!     .await?;
//!
//! let source = resolver.resolve_track_url(album, &album.tracks[0]).await;
//! assert!(source.is_local);
//! # Ok(())
//! # }
//! ```

pub mod resolver;
pub mod worker;
pub mod writer;

pub use resolver::{DownloadProgress, OfflineCacheResolver, ResolvedSource};
pub use worker::DownloadJob;
pub use writer::{select_writer, CacheFileWriter, DirectFileWriter, StreamingFileWriter};
