//! # Offline Cache Resolver
//!
//! Substitutes locally persisted album files for remote URLs.
//!
//! Layout under the cache root:
//!
//! ```text
//! albums/<album_id>/cover.jpg
//! albums/<album_id>/song-<track_id>
//! ```
//!
//! The `offline.album.<album_id>` setting is the authoritative presence flag.
//! It is written only after every file of the album is on disk, and cleared
//! before any file is removed.

use bridge_traits::http::HttpClient;
use bridge_traits::object_url::ObjectUrlStore;
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use core_library::models::{Album, AlbumId, Track};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::worker::{run_worker, DownloadJob};
use crate::cache::writer::{select_writer, CacheFileWriter};
use crate::error::{PlaybackError, Result};

const COVER_FILE: &str = "cover.jpg";
const COVER_CONTENT_TYPE: &str = "image/jpeg";

/// Where a track or cover should be loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub url: String,
    /// `true` when `url` is an object URL over cached bytes
    pub is_local: bool,
}

impl ResolvedSource {
    fn remote(url: &str) -> Self {
        Self {
            url: url.to_string(),
            is_local: false,
        }
    }

    fn local(url: String) -> Self {
        Self {
            url,
            is_local: true,
        }
    }
}

/// Progress reported after each file of an album download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Files completed so far
    pub downloaded: usize,
    /// Files in the album (cover included)
    pub total: usize,
}

impl DownloadProgress {
    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.total
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.downloaded as f64 / self.total as f64
    }
}

/// Resolves album files from the offline cache, falling back to remote URLs.
pub struct OfflineCacheResolver {
    fs: Arc<dyn FileSystemAccess>,
    settings: Arc<dyn SettingsStore>,
    http: Arc<dyn HttpClient>,
    object_urls: Arc<dyn ObjectUrlStore>,
    writer: Arc<dyn CacheFileWriter>,
    root: PathBuf,
    enabled: bool,
    event_bus: Option<EventBus>,
}

impl OfflineCacheResolver {
    /// Create a resolver rooted at `root`.
    ///
    /// The file writer is chosen here from
    /// [`FileSystemAccess::supports_direct_write`].
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        settings: Arc<dyn SettingsStore>,
        http: Arc<dyn HttpClient>,
        object_urls: Arc<dyn ObjectUrlStore>,
        root: impl Into<PathBuf>,
    ) -> Self {
        let writer = select_writer(fs.clone());
        debug!(writer = writer.name(), "Selected cache file writer");
        Self {
            fs,
            settings,
            http,
            object_urls,
            writer,
            root: root.into(),
            enabled: true,
            event_bus: None,
        }
    }

    /// Disabled resolvers always answer with remote URLs and refuse downloads.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set event bus for download events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn writer_name(&self) -> &'static str {
        self.writer.name()
    }

    /// Directory holding one album's files.
    pub fn album_dir(&self, album_id: &AlbumId) -> PathBuf {
        self.root.join("albums").join(album_id.as_str())
    }

    pub fn cover_path(&self, album_id: &AlbumId) -> PathBuf {
        self.album_dir(album_id).join(COVER_FILE)
    }

    pub fn track_path(&self, album_id: &AlbumId, track: &Track) -> PathBuf {
        self.album_dir(album_id).join(format!("song-{}", track.id))
    }

    fn flag_key(album_id: &AlbumId) -> String {
        format!("offline.album.{}", album_id)
    }

    /// Whether the album is fully cached. Storage errors read as `false`.
    pub async fn is_album_cached(&self, album: &Album) -> bool {
        if !self.enabled {
            return false;
        }
        match self.settings.get_bool(&Self::flag_key(&album.id)).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                debug!(album = %album.id, error = %e, "Presence flag unreadable");
                false
            }
        }
    }

    /// URL to play `track` from. Never fails: anything short of a readable
    /// cached file yields the remote URL.
    #[instrument(skip(self, album, track), fields(album = %album.id, track = %track.id))]
    pub async fn resolve_track_url(&self, album: &Album, track: &Track) -> ResolvedSource {
        let path = self.track_path(&album.id, track);
        match self.open_local(album, &path, &track.content_type).await {
            Ok(Some(url)) => {
                debug!(url = %url, "Resolved track from offline cache");
                ResolvedSource::local(url)
            }
            Ok(None) => ResolvedSource::remote(&track.url),
            Err(e) => {
                debug!(error = %e, "Offline lookup failed, using remote URL");
                ResolvedSource::remote(&track.url)
            }
        }
    }

    /// URL to show the album cover from, `None` if the album has no cover.
    #[instrument(skip(self, album), fields(album = %album.id))]
    pub async fn resolve_cover_url(&self, album: &Album) -> Option<ResolvedSource> {
        let remote = album.largest_cover()?.url.clone();
        let path = self.cover_path(&album.id);
        match self.open_local(album, &path, COVER_CONTENT_TYPE).await {
            Ok(Some(url)) => Some(ResolvedSource::local(url)),
            Ok(None) => Some(ResolvedSource::remote(&remote)),
            Err(e) => {
                debug!(error = %e, "Offline cover lookup failed, using remote URL");
                Some(ResolvedSource::remote(&remote))
            }
        }
    }

    async fn open_local(
        &self,
        album: &Album,
        path: &Path,
        content_type: &str,
    ) -> Result<Option<String>> {
        if !self.is_album_cached(album).await {
            return Ok(None);
        }
        if !self.fs.exists(&self.album_dir(&album.id)).await? {
            return Ok(None);
        }
        let data = self.fs.read_file(path).await?;
        let url = self.object_urls.create(data, content_type)?;
        Ok(Some(url))
    }

    /// Download the largest cover and every track of `album`, in that order.
    ///
    /// `on_progress` runs after each file with a strictly increasing
    /// `downloaded` count. The album is flagged as cached only once every
    /// file is written; on failure the flag stays unset and the files
    /// already written are left for a later delete.
    #[instrument(skip(self, album, on_progress), fields(album = %album.id))]
    pub async fn download_album<F>(&self, album: &Album, mut on_progress: F) -> Result<()>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        if !self.enabled {
            return Err(PlaybackError::CacheError(
                "offline cache is disabled".to_string(),
            ));
        }

        let jobs = self.jobs_for(album);
        let total = jobs.len();
        info!(total, "Downloading album for offline use");
        self.emit(CacheEvent::DownloadStarted {
            album_id: album.id.to_string(),
            total,
        });

        if let Err(e) = self.download_jobs(album, jobs, &mut on_progress).await {
            warn!(error = %e, "Album download failed");
            self.emit(CacheEvent::DownloadFailed {
                album_id: album.id.to_string(),
                message: e.to_string(),
            });
            return Err(e);
        }

        self.settings
            .set_bool(&Self::flag_key(&album.id), true)
            .await?;
        info!("Album available offline");
        self.emit(CacheEvent::DownloadCompleted {
            album_id: album.id.to_string(),
        });
        Ok(())
    }

    fn jobs_for(&self, album: &Album) -> Vec<DownloadJob> {
        let cover = album.largest_cover().map(|cover| DownloadJob {
            url: cover.url.clone(),
            path: self.cover_path(&album.id),
        });
        let tracks = album.tracks.iter().map(|track| DownloadJob {
            url: track.url.clone(),
            path: self.track_path(&album.id, track),
        });
        cover.into_iter().chain(tracks).collect()
    }

    async fn download_jobs<F>(
        &self,
        album: &Album,
        jobs: Vec<DownloadJob>,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let total = jobs.len();
        self.fs.create_dir_all(&self.album_dir(&album.id)).await?;

        for (done, job) in jobs.into_iter().enumerate() {
            run_worker(self.http.clone(), self.writer.clone(), job).await?;
            let progress = DownloadProgress {
                downloaded: done + 1,
                total,
            };
            on_progress(progress);
            self.emit(CacheEvent::DownloadProgress {
                album_id: album.id.to_string(),
                downloaded: progress.downloaded,
                total,
            });
        }
        Ok(())
    }

    /// Remove an album from the offline cache. Missing files are fine.
    #[instrument(skip(self, album), fields(album = %album.id))]
    pub async fn delete_album(&self, album: &Album) -> Result<()> {
        self.settings.delete(&Self::flag_key(&album.id)).await?;

        let dir = self.album_dir(&album.id);
        if self.fs.exists(&dir).await? {
            match self.fs.delete_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!("Removed offline album");
        self.emit(CacheEvent::AlbumDeleted {
            album_id: album.id.to_string(),
        });
        Ok(())
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}
