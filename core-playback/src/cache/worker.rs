//! One-shot download workers.
//!
//! Every file gets a freshly spawned task that lets the writer fetch and
//! persist the URL, then reports back over a oneshot channel. The task is
//! joined before the caller moves on, so at most one worker exists per
//! download.

use bridge_traits::http::HttpClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cache::writer::CacheFileWriter;
use crate::error::{PlaybackError, Result};

/// A single file to fetch and persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub path: PathBuf,
}

/// Runs `job` on a dedicated task and waits for its reply.
pub async fn run_worker(
    http: Arc<dyn HttpClient>,
    writer: Arc<dyn CacheFileWriter>,
    job: DownloadJob,
) -> Result<()> {
    let (reply_tx, reply_rx) = oneshot::channel();
    let url = job.url.clone();

    let handle = tokio::spawn(async move {
        let result = fetch_and_write(http.as_ref(), writer.as_ref(), &job).await;
        let _ = reply_tx.send(result);
    });

    let reply = reply_rx.await;
    if let Err(e) = handle.await {
        warn!(url = %url, error = %e, "Download worker did not finish cleanly");
    }

    reply.unwrap_or_else(|_| {
        Err(PlaybackError::DownloadFailed {
            url,
            reason: "worker exited without reporting".to_string(),
        })
    })
}

async fn fetch_and_write(
    http: &dyn HttpClient,
    writer: &dyn CacheFileWriter,
    job: &DownloadJob,
) -> Result<()> {
    let size = writer.store(http, &job.url, &job.path).await?;
    debug!(url = %job.url, path = ?job.path, size, writer = writer.name(), "Stored file");
    Ok(())
}
