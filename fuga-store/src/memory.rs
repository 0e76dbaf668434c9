use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{BlobBackend, Connector, Credentials, PutResult, StoreError, StoreResult};

// container name -> key -> contents (keys sorted, as S3 lists them)
type Containers = HashMap<String, BTreeMap<String, Bytes>>;

#[derive(Default)]
struct Shared {
    containers: RwLock<Containers>,
    required: Option<Credentials>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    writes: AtomicUsize,
}

/// In-memory backend for testing and development.
///
/// Clones share state, so a test can keep one clone for inspection while a
/// handle owns another.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept connections made with exactly these credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            shared: Arc::new(Shared {
                required: Some(credentials),
                ..Shared::default()
            }),
        }
    }

    /// Create an empty container
    pub fn with_container<S: Into<String>>(self, name: S) -> Self {
        self.shared
            .containers
            .write()
            .entry(name.into())
            .or_default();
        self
    }

    /// Seed a blob directly, bypassing any handle
    pub fn insert<C, K, D>(&self, container: C, key: K, data: D)
    where
        C: Into<String>,
        K: Into<String>,
        D: Into<Bytes>,
    {
        self.shared
            .containers
            .write()
            .entry(container.into())
            .or_default()
            .insert(key.into(), data.into());
    }

    pub fn contents(&self, container: &str, key: &str) -> Option<Bytes> {
        self.shared
            .containers
            .read()
            .get(container)
            .and_then(|blobs| blobs.get(key).cloned())
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Number of successful `store` calls across all connections
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, credentials: &Credentials) -> StoreResult<Arc<dyn BlobBackend>> {
        if let Some(required) = &self.shared.required {
            if required != credentials {
                return Err(StoreError::connection(format!(
                    "access denied for access key {}",
                    credentials.access_key()
                )));
            }
        }

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryBackend {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One connection to a [`MemoryConnector`]'s state
pub struct MemoryBackend {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl MemoryBackend {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn with_container<F, R>(&self, container: &str, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut BTreeMap<String, Bytes>) -> R,
    {
        self.ensure_open()?;
        let mut containers = self.shared.containers.write();
        let blobs = containers.get_mut(container).ok_or_else(|| StoreError::ContainerNotFound {
            name: container.to_string(),
        })?;
        Ok(f(blobs))
    }
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        self.ensure_open()?;
        Ok(self.shared.containers.read().contains_key(container))
    }

    async fn list_keys(&self, container: &str) -> StoreResult<Vec<String>> {
        self.with_container(container, |blobs| blobs.keys().cloned().collect())
    }

    async fn exists(&self, container: &str, key: &str) -> StoreResult<bool> {
        self.with_container(container, |blobs| blobs.contains_key(key))
    }

    async fn fetch(&self, container: &str, key: &str) -> StoreResult<Option<Bytes>> {
        self.with_container(container, |blobs| blobs.get(key).cloned())
    }

    async fn store(
        &self,
        container: &str,
        key: &str,
        _content_type: Option<&str>,
        data: Bytes,
    ) -> StoreResult<PutResult> {
        let size_bytes = data.len() as u64;
        self.with_container(container, |blobs| {
            blobs.insert(key.to_string(), data);
        })?;
        self.shared.writes.fetch_add(1, Ordering::SeqCst);

        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn remove(&self, container: &str, key: &str) -> StoreResult<()> {
        self.with_container(container, |blobs| {
            blobs.remove(key);
        })
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("access", "secret")
    }

    #[tokio::test]
    async fn rejects_wrong_credentials() {
        let connector = MemoryConnector::with_credentials(creds());
        let result = connector.connect(&Credentials::new("access", "wrong")).await;
        assert!(matches!(result, Err(StoreError::Connection { .. })));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn lists_keys_sorted() {
        let connector = MemoryConnector::new().with_container("docs");
        connector.insert("docs", "b", &b"2"[..]);
        connector.insert("docs", "a", &b"1"[..]);

        let backend = connector.connect(&creds()).await.unwrap();
        assert_eq!(backend.list_keys("docs").await.unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn seeded_blobs_are_visible_through_a_connection() {
        let connector = MemoryConnector::new();
        connector.insert("docs", "a", &b"1"[..]);

        tokio_test::block_on(async {
            let backend = tokio_test::assert_ok!(connector.connect(&creds()).await);
            let data = tokio_test::assert_ok!(backend.fetch("docs", "a").await);
            assert_eq!(data, Some(Bytes::from_static(b"1")));
        });
    }

    #[tokio::test]
    async fn missing_key_is_none_not_error() {
        let connector = MemoryConnector::new().with_container("docs");
        let backend = connector.connect(&creds()).await.unwrap();
        assert_eq!(backend.fetch("docs", "nope").await.unwrap(), None);
        assert!(!backend.exists("docs", "nope").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_container_is_reported() {
        let connector = MemoryConnector::new();
        let backend = connector.connect(&creds()).await.unwrap();
        assert!(!backend.container_exists("ghost").await.unwrap());
        assert!(matches!(
            backend.list_keys("ghost").await,
            Err(StoreError::ContainerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn close_counts_once_and_blocks_further_calls() {
        let connector = MemoryConnector::new().with_container("docs");
        let backend = connector.connect(&creds()).await.unwrap();

        backend.close().await.unwrap();
        backend.close().await.unwrap();
        assert_eq!(connector.close_count(), 1);
        assert!(matches!(backend.list_keys("docs").await, Err(StoreError::Closed)));
    }
}
