//! File writing capability for the offline cache.
//!
//! Hosts either write a whole buffer in one call or only expose a write
//! stream. The choice is made once, when the resolver is built. The
//! streaming writer never holds a whole track in memory: the response body
//! is copied straight from the HTTP stream into the file.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::storage::FileSystemAccess;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::error::{PlaybackError, Result};

/// Fetches one remote file and persists it.
#[async_trait]
pub trait CacheFileWriter: Send + Sync {
    /// Download `url` into `path`, returning the number of bytes written.
    async fn store(&self, http: &dyn HttpClient, url: &str, path: &Path) -> Result<u64>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

fn download_failed(url: &str, reason: impl ToString) -> PlaybackError {
    PlaybackError::DownloadFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Buffers the response and writes it with [`FileSystemAccess::write_file`].
pub struct DirectFileWriter {
    fs: Arc<dyn FileSystemAccess>,
}

impl DirectFileWriter {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl CacheFileWriter for DirectFileWriter {
    async fn store(&self, http: &dyn HttpClient, url: &str, path: &Path) -> Result<u64> {
        let response = http
            .execute(HttpRequest::get(url))
            .await
            .map_err(|e| download_failed(url, e))?;
        if !response.is_success() {
            return Err(download_failed(
                url,
                format!("HTTP status {}", response.status),
            ));
        }

        let size = response.body.len() as u64;
        self.fs.write_file(path, response.body).await?;
        Ok(size)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Copies [`HttpClient::download_stream`] into
/// [`FileSystemAccess::open_write_stream`].
pub struct StreamingFileWriter {
    fs: Arc<dyn FileSystemAccess>,
}

impl StreamingFileWriter {
    pub fn new(fs: Arc<dyn FileSystemAccess>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl CacheFileWriter for StreamingFileWriter {
    async fn store(&self, http: &dyn HttpClient, url: &str, path: &Path) -> Result<u64> {
        let mut body = http
            .download_stream(url.to_string())
            .await
            .map_err(|e| download_failed(url, e))?;

        let mut file = self.fs.open_write_stream(path).await?;
        let size = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| download_failed(url, e))?;
        file.shutdown().await?;
        Ok(size)
    }

    fn name(&self) -> &'static str {
        "streaming"
    }
}

/// Picks the writer matching the host's capabilities.
pub fn select_writer(fs: Arc<dyn FileSystemAccess>) -> Arc<dyn CacheFileWriter> {
    if fs.supports_direct_write() {
        Arc::new(DirectFileWriter::new(fs))
    } else {
        Arc::new(StreamingFileWriter::new(fs))
    }
}
