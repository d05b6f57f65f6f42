//! # Core Configuration Module
//!
//! Builder-based configuration for the playback core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the catalog endpoint plus every host bridge the core
//! needs. [`CoreConfigBuilder::build`] validates fail-fast: a missing bridge
//! is reported as [`Error::CapabilityMissing`] with a message naming what the
//! host must inject.
//!
//! ## Bridges
//!
//! | Bridge | Used by | Desktop default |
//! |--------|---------|-----------------|
//! | `HttpClient` | catalog, downloads | `ReqwestHttpClient` |
//! | `FileSystemAccess` | offline cache | `TokioFileSystem` |
//! | `SettingsStore` | offline presence flags | `SqliteSettingsStore` |
//! | `ObjectUrlStore` | cached playback | `MemoryObjectUrlStore` |
//! | `AudioOutput` | media element controller | `HeadlessAudioOutput` |
//! | `MediaSession` | lock screen / media keys | `TracingMediaSession` |
//!
//! Desktop defaults are injected only with the `desktop-shims` feature.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .catalog_url("https://music.example.com")
//!     .api_key("s3cret")
//!     .cache_dir("/home/me/.cache/albumcast")
//!     .build()?;
//! ```
//!
//! Without `desktop-shims`, a missing bridge fails the build:
//!
//! ```ignore
//! let err = CoreConfig::builder()
//!     .catalog_url("https://music.example.com")
//!     .cache_dir("/tmp/cache")
//!     .build()
//!     .unwrap_err();
//! // Capability missing: HttpClient - ...
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AudioOutput, FileSystemAccess, HttpClient, MediaSession, ObjectUrlStore, SettingsStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Media server base URL, without trailing slash
    pub catalog_url: String,

    /// Key appended to catalog requests as `apiKey`
    pub api_key: Option<String>,

    /// Directory holding offline albums and the desktop settings database
    pub cache_dir: PathBuf,

    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub object_urls: Arc<dyn ObjectUrlStore>,
    pub audio_output: Arc<dyn AudioOutput>,

    /// OS media session (optional; `None` disables lock-screen integration)
    pub media_session: Option<Arc<dyn MediaSession>>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("catalog_url", &self.catalog_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("cache_dir", &self.cache_dir)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("object_urls", &"ObjectUrlStore { ... }")
            .field("audio_output", &"AudioOutput { ... }")
            .field(
                "media_session",
                &self.media_session.as_ref().map(|_| "MediaSession { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Resolve tracks from, and allow downloads into, the offline cache
    pub enable_offline_cache: bool,

    /// Publish metadata and action handlers to the media session
    pub enable_media_session: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_offline_cache: true,
            enable_media_session: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Checks that the catalog URL is an absolute http(s) URL, that the cache
    /// directory is set, and that a provided API key is not blank.
    pub fn validate(&self) -> Result<()> {
        if self.catalog_url.is_empty() {
            return Err(Error::Config("Catalog URL cannot be empty".to_string()));
        }

        if !(self.catalog_url.starts_with("http://") || self.catalog_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "Catalog URL must start with http:// or https://, got '{}'",
                self.catalog_url
            )));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if matches!(&self.api_key, Some(key) if key.trim().is_empty()) {
            return Err(Error::Config(
                "API key cannot be blank. Omit .api_key() for servers without a key.".to_string(),
            ));
        }

        Ok(())
    }

    /// Media session to use, honouring [`FeatureFlags::enable_media_session`].
    pub fn active_media_session(&self) -> Option<Arc<dyn MediaSession>> {
        if self.features.enable_media_session {
            self.media_session.clone()
        } else {
            None
        }
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, desktop_default: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{capability} implementation is required for {purpose}. \
             Desktop: enable the 'desktop-shims' feature to use the default {desktop_default}. \
             Mobile/Web: inject a platform-native adapter."
        ),
    }
}

/// Bridges filled in by [`provide_defaults`].
struct Bridges {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
    settings_store: Arc<dyn SettingsStore>,
    object_urls: Arc<dyn ObjectUrlStore>,
    audio_output: Arc<dyn AudioOutput>,
    media_session: Option<Arc<dyn MediaSession>>,
}

#[cfg(feature = "desktop-shims")]
fn provide_defaults(builder: &mut CoreConfigBuilder, cache_dir: &Path) -> Result<Bridges> {
    use bridge_desktop::{
        HeadlessAudioOutput, MemoryObjectUrlStore, ReqwestHttpClient, TokioFileSystem,
        TracingMediaSession,
    };

    let http_client: Arc<dyn HttpClient> = match builder.http_client.take() {
        Some(client) => client,
        None => Arc::new(ReqwestHttpClient::new().map_err(|e| {
            Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
        })?),
    };
    let object_urls: Arc<dyn ObjectUrlStore> = builder
        .object_urls
        .take()
        .unwrap_or_else(|| Arc::new(MemoryObjectUrlStore::new()));
    let audio_output: Arc<dyn AudioOutput> = builder.audio_output.take().unwrap_or_else(|| {
        Arc::new(HeadlessAudioOutput::new(
            http_client.clone(),
            object_urls.clone(),
        ))
    });
    let file_system: Arc<dyn FileSystemAccess> = builder
        .file_system
        .take()
        .unwrap_or_else(|| Arc::new(TokioFileSystem::new()));
    let settings_store = match builder.settings_store.take() {
        Some(store) => store,
        None => provide_default_settings_store(cache_dir)?,
    };
    let media_session: Arc<dyn MediaSession> = builder
        .media_session
        .take()
        .unwrap_or_else(|| Arc::new(TracingMediaSession::new()));

    Ok(Bridges {
        http_client,
        file_system,
        settings_store,
        object_urls,
        audio_output,
        media_session: Some(media_session),
    })
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_defaults(builder: &mut CoreConfigBuilder, _cache_dir: &Path) -> Result<Bridges> {
    Ok(Bridges {
        http_client: builder
            .http_client
            .take()
            .ok_or_else(|| {
                capability_missing(
                    "HttpClient",
                    "catalog fetches and downloads",
                    "ReqwestHttpClient",
                )
            })?,
        file_system: builder.file_system.take().ok_or_else(|| {
            capability_missing("FileSystemAccess", "the offline cache", "TokioFileSystem")
        })?,
        settings_store: builder.settings_store.take().ok_or_else(|| {
            capability_missing(
                "SettingsStore",
                "offline presence flags",
                "SqliteSettingsStore",
            )
        })?,
        object_urls: builder.object_urls.take().ok_or_else(|| {
            capability_missing(
                "ObjectUrlStore",
                "playing cached tracks",
                "MemoryObjectUrlStore",
            )
        })?,
        audio_output: builder.audio_output.take().ok_or_else(|| {
            capability_missing("AudioOutput", "playback", "HeadlessAudioOutput")
        })?,
        media_session: builder.media_session.take(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(cache_dir: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = cache_dir.join("settings.db");

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so initialise on a helper thread there.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    catalog_url: Option<String>,
    api_key: Option<String>,
    cache_dir: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    object_urls: Option<Arc<dyn ObjectUrlStore>>,
    audio_output: Option<Arc<dyn AudioOutput>>,
    media_session: Option<Arc<dyn MediaSession>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Media server base URL. A trailing `/` is stripped.
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.catalog_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Directory for offline albums (and, on desktop, `settings.db`).
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn object_urls(mut self, store: Arc<dyn ObjectUrlStore>) -> Self {
        self.object_urls = Some(store);
        self
    }

    pub fn audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn media_session(mut self, session: Arc<dyn MediaSession>) -> Self {
        self.media_session = Some(session);
        self
    }

    /// Default: true
    pub fn enable_offline_cache(mut self, enabled: bool) -> Self {
        self.features.enable_offline_cache = enabled;
        self
    }

    /// Default: true
    pub fn enable_media_session(mut self, enabled: bool) -> Self {
        self.features.enable_media_session = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the catalog URL or cache directory is missing
    ///   or invalid
    /// - [`Error::CapabilityMissing`] when a required bridge was not injected
    ///   and no desktop default is available
    pub fn build(mut self) -> Result<CoreConfig> {
        let catalog_url = self.catalog_url.take().ok_or_else(|| {
            Error::Config("Catalog URL is required. Use .catalog_url() to set it.".to_string())
        })?;

        let cache_dir = self.cache_dir.take().ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let bridges = provide_defaults(&mut self, &cache_dir)?;

        let config = CoreConfig {
            catalog_url,
            api_key: self.api_key,
            cache_dir,
            http_client: bridges.http_client,
            file_system: bridges.file_system,
            settings_store: bridges.settings_store,
            object_urls: bridges.object_urls,
            audio_output: bridges.audio_output,
            media_session: bridges.media_session,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::media_session::{
        ActionHandler, MediaAction, MetadataUpdate, PositionState,
    };
    use bridge_traits::{
        BridgeError, HttpRequest, HttpResponse, MediaElement, ObjectBlob,
    };
    use bytes::Bytes;

    struct StubHttp;

    #[async_trait]
    impl HttpClient for StubHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("stub".into()))
        }

        async fn download_stream(
            &self,
            _url: String,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::NotAvailable("stub".into()))
        }
    }

    struct StubFs;

    #[async_trait]
    impl FileSystemAccess for StubFs {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn read_file(&self, _path: &Path) -> BridgeResult<Bytes> {
            Ok(Bytes::new())
        }
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn open_write_stream(
            &self,
            _path: &Path,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
            Ok(Box::new(tokio::io::sink()))
        }
    }

    struct StubSettings;

    #[async_trait]
    impl SettingsStore for StubSettings {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct StubUrls;

    impl ObjectUrlStore for StubUrls {
        fn create(&self, _data: Bytes, _content_type: &str) -> BridgeResult<String> {
            Ok("blob:stub".into())
        }
        fn revoke(&self, _url: &str) -> bool {
            false
        }
        fn get(&self, _url: &str) -> Option<ObjectBlob> {
            None
        }
    }

    struct StubAudio;

    impl AudioOutput for StubAudio {
        fn create_element(&self, _url: &str) -> BridgeResult<Arc<dyn MediaElement>> {
            Err(BridgeError::NotAvailable("stub".into()))
        }
    }

    struct StubSession;

    impl MediaSession for StubSession {
        fn set_metadata(&self, _update: MetadataUpdate) {}
        fn clear_metadata(&self) {}
        fn set_action_handler(&self, _action: MediaAction, _handler: Option<ActionHandler>) {}
        fn set_position_state(&self, _state: PositionState) {}
    }

    fn full_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .catalog_url("https://music.example.com/")
            .cache_dir("/tmp/albumcast-test")
            .http_client(Arc::new(StubHttp))
            .file_system(Arc::new(StubFs))
            .settings_store(Arc::new(StubSettings))
            .object_urls(Arc::new(StubUrls))
            .audio_output(Arc::new(StubAudio))
            .media_session(Arc::new(StubSession))
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let config = full_builder().api_key("k-1").build().unwrap();
        assert_eq!(config.catalog_url, "https://music.example.com");
        assert_eq!(config.api_key.as_deref(), Some("k-1"));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/albumcast-test"));
        assert!(config.active_media_session().is_some());
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn test_builder_requires_catalog_url() {
        let result = CoreConfig::builder().cache_dir("/tmp/cache").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Catalog URL")));
    }

    #[test]
    fn test_builder_requires_cache_dir() {
        let result = CoreConfig::builder()
            .catalog_url("https://music.example.com")
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Cache directory")));
    }

    #[test]
    fn test_validate_rejects_relative_catalog_url() {
        let result = full_builder().catalog_url("music.example.com").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("http")));
    }

    #[test]
    fn test_validate_rejects_blank_api_key() {
        let result = full_builder().api_key("  ").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("API key")));
    }

    #[test]
    fn test_media_session_flag() {
        let config = full_builder().enable_media_session(false).build().unwrap();
        assert!(config.media_session.is_some());
        assert!(config.active_media_session().is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = full_builder().api_key("very-secret").build().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_bridge_is_capability_error() {
        let result = CoreConfig::builder()
            .catalog_url("https://music.example.com")
            .cache_dir("/tmp/cache")
            .http_client(Arc::new(StubHttp))
            .build();

        match result {
            Err(Error::CapabilityMissing {
                capability,
                message,
            }) => {
                assert_eq!(capability, "FileSystemAccess");
                assert!(message.contains("desktop-shims"));
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let dir = std::env::temp_dir().join(format!("albumcast-config-{}", uuid::Uuid::new_v4()));

        let config = CoreConfig::builder()
            .catalog_url("https://music.example.com")
            .cache_dir(&dir)
            .build()
            .unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            config
                .settings_store
                .set_string("offline.album.a1", "true")
                .await
                .unwrap();
            assert_eq!(
                config.settings_store.get_bool("offline.album.a1").await.unwrap(),
                Some(true)
            );
        });

        drop(config);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
