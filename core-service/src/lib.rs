//! Core service façade and bootstrap helpers.
//!
//! [`CoreService`] owns one playback session: the catalog, the offline cache
//! resolver and the playlist sequencer, all wired from a single
//! [`CoreConfig`]. Hosts create it explicitly and share it by cloning; there
//! is no global state. Created inside a Tokio runtime, the service runs the
//! sequencer's command loop itself, so auto-advance and media keys work
//! without further calls. Desktop apps typically enable the `desktop-shims`
//! feature and call [`bootstrap_desktop`].

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::ObjectUrlStore;
use core_library::{
    share_link, Album, AlbumFilter, AlbumId, CatalogSource, HttpCatalogSource, LibraryError,
};
use core_playback::{DownloadProgress, OfflineCacheResolver, PlaylistSequencer};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

/// Capacity of the broadcast channel behind [`CoreService::subscribe`].
const EVENT_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: CoreConfig,
    catalog: Arc<dyn CatalogSource>,
    resolver: Arc<OfflineCacheResolver>,
    sequencer: Arc<PlaylistSequencer>,
    events: EventBus,
    albums: RwLock<Vec<Arc<Album>>>,
    command_loop: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.sequencer.shutdown();
    }
}

impl CoreService {
    /// Create a service reading the catalog from the configured media server.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let catalog = Arc::new(HttpCatalogSource::new(
            config.http_client.clone(),
            config.catalog_url.clone(),
            config.api_key.clone(),
        ));
        Self::with_catalog(config, catalog)
    }

    /// Create a service over a custom catalog source.
    pub fn with_catalog(config: CoreConfig, catalog: Arc<dyn CatalogSource>) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(EVENT_CAPACITY);
        let resolver = Arc::new(
            OfflineCacheResolver::new(
                config.file_system.clone(),
                config.settings_store.clone(),
                config.http_client.clone(),
                config.object_urls.clone(),
                config.cache_dir.clone(),
            )
            .with_enabled(config.features.enable_offline_cache)
            .with_event_bus(events.clone()),
        );
        let sequencer = Arc::new(
            PlaylistSequencer::new(
                config.audio_output.clone(),
                resolver.clone(),
                config.object_urls.clone(),
                config.active_media_session(),
            )
            .with_event_bus(events.clone()),
        );

        info!(
            catalog = %config.catalog_url,
            offline_cache = config.features.enable_offline_cache,
            media_session = config.active_media_session().is_some(),
            "Core service initialized"
        );

        let service = Self {
            inner: Arc::new(ServiceInner {
                config,
                catalog,
                resolver,
                sequencer,
                events,
                albums: RwLock::new(Vec::new()),
                command_loop: Mutex::new(None),
            }),
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            service.start_command_loop();
        } else {
            debug!("No Tokio runtime; command loop starts on start_command_loop()");
        }
        Ok(service)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn resolver(&self) -> Arc<OfflineCacheResolver> {
        Arc::clone(&self.inner.resolver)
    }

    pub fn sequencer(&self) -> Arc<PlaylistSequencer> {
        Arc::clone(&self.inner.sequencer)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Stream of playback and cache events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Fetch the catalog and replace the album list.
    ///
    /// Albums available offline get their cached cover attached. Object URLs
    /// held by the previous list are revoked.
    #[instrument(skip(self))]
    pub async fn load_catalog(&self) -> Result<Vec<Arc<Album>>> {
        let fetched = self.inner.catalog.fetch_albums().await?;

        let mut albums = Vec::with_capacity(fetched.len());
        for mut album in fetched {
            if self.inner.resolver.is_album_cached(&album).await {
                if let Some(cover) = self.inner.resolver.resolve_cover_url(&album).await {
                    if cover.is_local {
                        album.attach_cached_cover(cover.url);
                    }
                }
            }
            albums.push(Arc::new(album));
        }

        let previous = std::mem::replace(&mut *self.inner.albums.write(), albums.clone());
        for album in previous {
            if let Some(url) = &album.cached_cover {
                self.inner.config.object_urls.revoke(url);
            }
        }

        info!(albums = albums.len(), "Catalog loaded");
        Ok(albums)
    }

    /// Ask the server to re-run ingestion. Call [`load_catalog`](Self::load_catalog)
    /// later to pick up the result.
    pub async fn refresh_catalog(&self) -> Result<()> {
        self.inner.catalog.request_refresh().await?;
        Ok(())
    }

    /// Albums from the last [`load_catalog`](Self::load_catalog).
    pub fn albums(&self) -> Vec<Arc<Album>> {
        self.inner.albums.read().clone()
    }

    /// # Errors
    ///
    /// [`LibraryError::NotFound`] when the album is not in the loaded catalog.
    pub fn album(&self, id: &AlbumId) -> Result<Arc<Album>> {
        self.inner
            .albums
            .read()
            .iter()
            .find(|album| &album.id == id)
            .cloned()
            .ok_or_else(|| {
                LibraryError::NotFound {
                    entity_type: "album".to_string(),
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// Albums matching a search query. The keyword `playing` matches the
    /// album currently in the sequencer.
    pub fn filter_albums(&self, query: &str) -> Vec<Arc<Album>> {
        let filter = AlbumFilter::new(query);
        let playing = self.inner.sequencer.album().map(|album| album.id.clone());
        self.inner
            .albums
            .read()
            .iter()
            .filter(|album| filter.matches(album, playing.as_ref()))
            .cloned()
            .collect()
    }

    /// Link that opens the current album (if any) on `origin`, carrying the
    /// configured API key.
    pub fn share_link(&self, origin: &str) -> String {
        let album = self.inner.sequencer.album();
        share_link(origin, album.as_deref(), self.inner.config.api_key.as_deref())
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Play track `index` of album `id`, switching albums if needed.
    pub async fn play_album(&self, id: &AlbumId, index: usize) -> Result<()> {
        let sequencer = &self.inner.sequencer;
        let current = sequencer.album().map(|album| album.id.clone());
        if current.as_ref() != Some(id) {
            let album = self.album(id)?;
            sequencer.set_album(album);
        } else {
            debug!(album = %id, "Album already selected");
        }
        sequencer.play_song(index).await?;
        Ok(())
    }

    /// Run the sequencer's command loop (media keys, auto-advance) on the
    /// current Tokio runtime until [`shutdown`](Self::shutdown).
    ///
    /// Services built inside a runtime start it on construction; calling
    /// this again while it runs does nothing. Must be called from a Tokio
    /// runtime.
    pub fn start_command_loop(&self) {
        let mut command_loop = self.inner.command_loop.lock();
        if command_loop.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        *command_loop = Some(tokio::spawn(self.sequencer().run()));
        debug!("Command loop started");
    }

    pub fn is_command_loop_running(&self) -> bool {
        self.inner
            .command_loop
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop playback and end the command loop. The returned handle
    /// completes once the loop has exited.
    pub fn shutdown(&self) -> Option<JoinHandle<()>> {
        self.inner.sequencer.stop();
        self.inner.sequencer.shutdown();
        info!("Core service shut down");
        self.inner.command_loop.lock().take()
    }

    // ------------------------------------------------------------------
    // Offline cache
    // ------------------------------------------------------------------

    pub async fn download_album<F>(&self, id: &AlbumId, on_progress: F) -> Result<()>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let album = self.album(id)?;
        self.inner.resolver.download_album(&album, on_progress).await?;
        Ok(())
    }

    pub async fn delete_album(&self, id: &AlbumId) -> Result<()> {
        let album = self.album(id)?;
        self.inner.resolver.delete_album(&album).await?;
        Ok(())
    }

    pub async fn is_album_cached(&self, id: &AlbumId) -> Result<bool> {
        let album = self.album(id)?;
        Ok(self.inner.resolver.is_album_cached(&album).await)
    }
}

/// Convenience bootstrapper for desktop hosts using the default bridges.
///
/// Without `cache_dir` the platform cache directory is used
/// (`~/.cache/albumcast` on Linux). The returned service already runs its
/// command loop when called inside a Tokio runtime.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_service::bootstrap_desktop;
///
/// let core = bootstrap_desktop("https://music.example.com", None, None)?;
/// let albums = core.load_catalog().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    catalog_url: &str,
    cache_dir: Option<std::path::PathBuf>,
    api_key: Option<String>,
) -> Result<CoreService> {
    let cache_dir = cache_dir.unwrap_or_else(bridge_desktop::TokioFileSystem::default_cache_dir);
    let mut builder = CoreConfig::builder()
        .catalog_url(catalog_url)
        .cache_dir(cache_dir);
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    CoreService::new(builder.build()?)
}
