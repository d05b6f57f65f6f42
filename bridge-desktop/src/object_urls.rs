//! In-process object URL registry.

use bridge_traits::{
    error::Result,
    object_url::{ObjectBlob, ObjectUrlStore},
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

const ORIGIN: &str = "albumcast";

/// Keeps blobs in memory under `blob:albumcast/<uuid>` URLs until revoked,
/// the shape browsers give `blob:<origin>/<uuid>`.
#[derive(Default)]
pub struct MemoryObjectUrlStore {
    blobs: Mutex<HashMap<String, ObjectBlob>>,
}

impl MemoryObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live URLs.
    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl ObjectUrlStore for MemoryObjectUrlStore {
    fn create(&self, data: Bytes, content_type: &str) -> Result<String> {
        let url = format!("blob:{ORIGIN}/{}", Uuid::new_v4());
        debug!(url = %url, size = data.len(), content_type, "Created object URL");
        self.blobs.lock().insert(
            url.clone(),
            ObjectBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(url)
    }

    fn revoke(&self, url: &str) -> bool {
        let removed = self.blobs.lock().remove(url).is_some();
        if removed {
            debug!(url, "Revoked object URL");
        }
        removed
    }

    fn get(&self, url: &str) -> Option<ObjectBlob> {
        self.blobs.lock().get(url).cloned()
    }
}
