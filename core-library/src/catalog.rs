//! Catalog Source
//!
//! The catalog is owned by an external ingestion job and served as a single
//! JSON manifest. The core only reads it, through [`CatalogSource`].

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{LibraryError, Result};
use crate::models::{parse_manifest, Album};

/// Supplies the album catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every album, in catalog order, with tracks sorted by disk and
    /// track index.
    async fn fetch_albums(&self) -> Result<Vec<Album>>;

    /// Ask the owner of the catalog to re-run ingestion. Sources without a
    /// server behind them have nothing to refresh.
    async fn request_refresh(&self) -> Result<()> {
        Ok(())
    }
}

/// Catalog served by the media server at `{base_url}/data/albums.json`.
pub struct HttpCatalogSource {
    http: Arc<dyn HttpClient>,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCatalogSource {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn manifest_url(&self) -> String {
        format!("{}/data/albums.json", self.base_url)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_albums(&self) -> Result<Vec<Album>> {
        let mut request = HttpRequest::get(self.manifest_url());
        if let Some(key) = &self.api_key {
            request = request.query("apiKey", key.clone());
        }

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            let message = response
                .text()
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "catalog unavailable".to_string());
            return Err(LibraryError::Catalog {
                status: response.status,
                message,
            });
        }

        let albums = parse_manifest(&response.body)?;
        debug!(albums = albums.len(), "Catalog manifest loaded");
        Ok(albums)
    }

    /// Ask the server to re-run catalog ingestion. The server answers
    /// immediately; the refreshed manifest shows up on a later fetch.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn request_refresh(&self) -> Result<()> {
        let request = HttpRequest::post(format!("{}/api/refresh", self.base_url));
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(LibraryError::Catalog {
                status: response.status,
                message: "refresh request rejected".to_string(),
            });
        }
        info!("Catalog refresh requested");
        Ok(())
    }
}
