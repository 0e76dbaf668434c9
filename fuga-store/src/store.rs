use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{Credentials, StoreResult};

/// Opens authenticated connections to a storage backend
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect with the given credentials
    async fn connect(&self, credentials: &Credentials) -> StoreResult<Arc<dyn BlobBackend>>;
}

/// One live connection to a storage backend - must be implemented by all backends.
///
/// A missing key is reported through the return value (`None` / `false`),
/// never as an error, so callers can raise their own not-found error.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Whether the named container exists and is accessible
    async fn container_exists(&self, container: &str) -> StoreResult<bool>;

    /// All keys in the container, in backend order
    async fn list_keys(&self, container: &str) -> StoreResult<Vec<String>>;

    /// Whether a key exists
    async fn exists(&self, container: &str, key: &str) -> StoreResult<bool>;

    /// Full contents of a key, or `None` if it does not exist
    async fn fetch(&self, container: &str, key: &str) -> StoreResult<Option<Bytes>>;

    /// Create or overwrite a key
    async fn store(
        &self,
        container: &str,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> StoreResult<PutResult>;

    /// Delete a key
    async fn remove(&self, container: &str, key: &str) -> StoreResult<()>;

    /// Release the connection
    async fn close(&self) -> StoreResult<()>;
}

/// Result of a successful store operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}
