//! Locally addressable URLs for in-memory blobs.
//!
//! The offline cache hands persisted bytes to the media element through an
//! object URL instead of a remote one. Whoever creates a URL owns it and must
//! call [`ObjectUrlStore::revoke`] once nothing references it.

use bytes::Bytes;

use crate::error::Result;

/// Blob registered under an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// Host registry of object URLs.
pub trait ObjectUrlStore: Send + Sync {
    /// Register `data` and return a URL that resolves to it.
    fn create(&self, data: Bytes, content_type: &str) -> Result<String>;

    /// Release the blob behind `url`. Returns `false` if the URL was unknown.
    fn revoke(&self, url: &str) -> bool;

    /// Look up a live blob.
    fn get(&self, url: &str) -> Option<ObjectBlob>;

    /// Whether `url` belongs to this store's scheme.
    fn is_object_url(&self, url: &str) -> bool {
        url.starts_with("blob:")
    }
}
