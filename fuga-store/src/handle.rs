use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::types::base_name;
use crate::{
    BlobBackend, BlobContent, Connector, Credentials, Encoding, IncomingFile, LocalFile,
    Operation, PutResult, Receipt, S3Connector, StoreConfig, StoreError, StoreResult,
};

/// Public operations of [`ContainerHandle`], declared up front rather than
/// discovered at runtime.
pub const OPERATIONS: &[&str] = &[
    "open",
    "bind",
    "reset",
    "resolve",
    "list",
    "get",
    "get_bytes",
    "get_all",
    "upload",
    "upload_path",
    "download",
    "save_file",
    "delete",
    "accept_upload",
    "close",
    "scoped",
];

/// A resolved remote container on a live connection.
///
/// Two containers compare equal when they name the same remote container.
#[derive(Clone)]
pub struct Container {
    name: String,
    backend: Arc<dyn BlobBackend>,
}

impl Container {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys in backend order
    pub async fn list(&self) -> StoreResult<Vec<String>> {
        self.backend.list_keys(&self.name).await
    }

    /// Full contents of `key`, or `NotFound`
    pub async fn fetch(&self, key: &str) -> StoreResult<Bytes> {
        self.backend
            .fetch(&self.name, key)
            .await?
            .ok_or_else(|| StoreError::not_found(key, &self.name))
    }

    /// Create or overwrite `key`
    pub async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> StoreResult<PutResult> {
        self.backend.store(&self.name, key, content_type, data).await
    }

    /// Remove `key`, or `NotFound` if it is absent
    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        if !self.backend.exists(&self.name, key).await? {
            return Err(StoreError::not_found(key, &self.name));
        }
        self.backend.remove(&self.name, key).await
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Container {}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container").field("name", &self.name).finish()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Container: {}>", self.name)
    }
}

/// Single point of access to one remote container at a time.
///
/// The handle owns the credentials, at most one backend connection and an
/// optional container binding. Every blob operation takes an optional
/// container name; an explicit name wins over the binding.
///
/// Operations take `&mut self`: one handle serves one caller at a time. Use
/// one handle per concurrent task.
///
/// ```no_run
/// use fuga_store::{ContainerHandle, Encoding, LocalFile, StoreResult};
///
/// # async fn run() -> StoreResult<()> {
/// let mut store = ContainerHandle::from_env()?;
/// store.bind("docs").await?;
///
/// let mut file = LocalFile::open("report.pdf", "rb").await?;
/// store.upload(&mut file, None, None).await?;
///
/// let encoded = store.get("report.pdf", None, Encoding::Base64).await?;
/// store.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ContainerHandle<C = S3Connector> {
    connector: C,
    credentials: Option<Credentials>,
    connection: Option<Arc<dyn BlobBackend>>,
    binding: Option<Container>,
}

impl ContainerHandle<S3Connector> {
    /// Handle for the S3 endpoint described by `config`
    pub fn from_config(config: StoreConfig) -> Self {
        let connector = S3Connector::new(&config);
        Self::new(connector, config.credentials)
    }

    /// Handle configured from `FUGA_*` environment variables
    pub fn from_env() -> StoreResult<Self> {
        Ok(Self::from_config(StoreConfig::from_env()?))
    }
}

impl<C: Connector> ContainerHandle<C> {
    /// Create an unbound handle. No connection is made yet.
    pub fn new(connector: C, credentials: Credentials) -> Self {
        Self {
            connector,
            credentials: Some(credentials),
            connection: None,
            binding: None,
        }
    }

    /// Create a handle and bind it to `container_name` straight away
    pub async fn open(connector: C, credentials: Credentials, container_name: &str) -> StoreResult<Self> {
        let mut handle = Self::new(connector, credentials);
        handle.bind(container_name).await?;
        Ok(handle)
    }

    pub fn binding(&self) -> Option<&Container> {
        self.binding.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.credentials.is_none()
    }

    /// Connect afresh and make `container_name` the active binding.
    ///
    /// Any previous connection is released first, so a failed rebind leaves
    /// the handle unbound.
    #[instrument(level = "debug", skip(self))]
    pub async fn bind(&mut self, container_name: &str) -> StoreResult<()> {
        if container_name.trim().is_empty() {
            return Err(StoreError::invalid_name(container_name));
        }
        self.ensure_open()?;
        self.release_connection().await?;

        let container = self.lookup(container_name).await?;
        info!("Bound to container {}", container.name);
        self.binding = Some(container);
        Ok(())
    }

    /// Drop the current connection and bind to `container_name`
    pub async fn reset(&mut self, container_name: &str) -> StoreResult<()> {
        self.bind(container_name).await
    }

    /// The container an operation should act on: `container_name` if given,
    /// otherwise the binding.
    pub async fn resolve(&mut self, container_name: Option<&str>) -> StoreResult<Container> {
        self.ensure_open()?;
        match container_name {
            Some(name) => {
                let name = checked_name(name)?;
                if let Some(bound) = self.binding.as_ref().filter(|b| b.name == name) {
                    return Ok(bound.clone());
                }
                self.lookup(name).await
            }
            None => self.binding.clone().ok_or(StoreError::NotBound),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn list(&mut self, container_name: Option<&str>) -> StoreResult<Vec<String>> {
        let container = self.resolve(container_name).await?;
        container.list().await
    }

    /// Fetch a blob as raw bytes or base64 text
    #[instrument(level = "debug", skip(self))]
    pub async fn get(
        &mut self,
        filename: &str,
        container_name: Option<&str>,
        encoding: Encoding,
    ) -> StoreResult<BlobContent> {
        let data = self.get_bytes(filename, container_name).await?;
        Ok(BlobContent::encode(data, encoding))
    }

    pub async fn get_bytes(&mut self, filename: &str, container_name: Option<&str>) -> StoreResult<Bytes> {
        let filename = checked_name(filename)?;
        let container = self.resolve(container_name).await?;
        container.fetch(filename).await
    }

    /// Fetch every blob in listing order, stopping after `limit` blobs.
    /// `Some(0)` fetches nothing; pass `None` for every blob.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_all(
        &mut self,
        container_name: Option<&str>,
        encoding: Encoding,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, BlobContent)>> {
        let container = self.resolve(container_name).await?;
        let keys = container.list().await?;

        let mut blobs = Vec::new();
        for key in keys.into_iter().take(limit.unwrap_or(usize::MAX)) {
            let data = container.fetch(&key).await?;
            blobs.push((key, BlobContent::encode(data, encoding)));
        }
        Ok(blobs)
    }

    /// Upload the whole of a binary-read stream.
    ///
    /// The key is `save_as`, or the stream's base filename. An existing blob
    /// with that key is overwritten.
    #[instrument(level = "debug", skip(self, file), fields(source = ?file.name()))]
    pub async fn upload<R>(
        &mut self,
        file: &mut LocalFile<R>,
        container_name: Option<&str>,
        save_as: Option<&str>,
    ) -> StoreResult<Receipt>
    where
        R: AsyncRead + Unpin,
    {
        if !file.mode().can_upload_from() {
            return Err(StoreError::Mode {
                required: "read",
                actual: file.mode(),
            });
        }
        let key = target_key(save_as, file.base_name())?;
        let container = self.resolve(container_name).await?;

        let mut data = Vec::new();
        file.get_mut().read_to_end(&mut data).await?;

        let result = container.put(&key, None, Bytes::from(data)).await?;
        debug!("Uploaded {} bytes to {}/{}", result.size_bytes, container.name, key);
        Ok(receipt(Operation::Upload, &container, key, result))
    }

    /// Open `path` for binary reading and upload it
    pub async fn upload_path<P: AsRef<Path>>(
        &mut self,
        path: P,
        container_name: Option<&str>,
        save_as: Option<&str>,
    ) -> StoreResult<Receipt> {
        let mut file = LocalFile::open(path, "rb").await?;
        self.upload(&mut file, container_name, save_as).await
    }

    /// Write a blob verbatim into a binary-write stream.
    ///
    /// The key is `load_from`, or the stream's base filename.
    #[instrument(level = "debug", skip(self, file), fields(target = ?file.name()))]
    pub async fn download<W>(
        &mut self,
        file: &mut LocalFile<W>,
        container_name: Option<&str>,
        load_from: Option<&str>,
    ) -> StoreResult<Receipt>
    where
        W: AsyncWrite + Unpin,
    {
        if !file.mode().can_download_to() {
            return Err(StoreError::Mode {
                required: "write",
                actual: file.mode(),
            });
        }
        let key = target_key(load_from, file.base_name())?;
        let container = self.resolve(container_name).await?;
        let data = container.fetch(&key).await?;

        let stream = file.get_mut();
        stream.write_all(&data).await?;
        stream.flush().await?;

        Ok(Receipt::new(Operation::Download, container.name, key, data.len() as u64))
    }

    /// Save a blob to `directory/<filename>` on the local disk
    #[instrument(level = "debug", skip(self, directory))]
    pub async fn save_file<P: AsRef<Path>>(
        &mut self,
        filename: &str,
        directory: P,
        container_name: Option<&str>,
    ) -> StoreResult<Receipt> {
        let local_name = base_name(filename).ok_or_else(|| StoreError::invalid_name(filename))?;
        let container = self.resolve(container_name).await?;
        let data = container.fetch(filename).await?;

        let path = directory.as_ref().join(local_name);
        tokio::fs::write(&path, &data).await?;
        debug!("Saved {}/{} to {}", container.name, filename, path.display());

        Ok(Receipt::new(Operation::Save, container.name, filename, data.len() as u64))
    }

    /// Remove a blob. Deleting the same key twice fails the second time.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&mut self, filename: &str, container_name: Option<&str>) -> StoreResult<Receipt> {
        let filename = checked_name(filename)?;
        let container = self.resolve(container_name).await?;
        container.delete(filename).await?;
        info!("Deleted {}/{}", container.name, filename);
        Ok(Receipt::new(Operation::Delete, container.name, filename, 0))
    }

    /// Store an upload that arrived with its own filename (e.g. a form field).
    ///
    /// Only the base filename is used as the key; an empty name is rejected
    /// before anything is sent to the backend.
    #[instrument(level = "debug", skip(self, incoming), fields(filename = %incoming.filename))]
    pub async fn accept_upload(
        &mut self,
        incoming: IncomingFile,
        container_name: Option<&str>,
    ) -> StoreResult<Receipt> {
        let key = base_name(&incoming.filename)
            .ok_or_else(|| StoreError::invalid_name(incoming.filename.clone()))?;
        let container = self.resolve(container_name).await?;

        let result = container
            .put(&key, incoming.content_type.as_deref(), incoming.data)
            .await?;
        Ok(receipt(Operation::Upload, &container, key, result))
    }

    /// Release the connection and forget the binding and credentials.
    /// Closing twice is a no-op.
    pub async fn close(&mut self) -> StoreResult<()> {
        self.credentials = None;
        self.binding = None;
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
            info!("Container handle closed");
        }
        Ok(())
    }

    /// Run `body` against this handle, then close it whether or not the body
    /// succeeded. A body error takes precedence over a close error.
    ///
    /// ```no_run
    /// # use fuga_store::{ContainerHandle, StoreResult};
    /// # async fn run(mut store: ContainerHandle) -> StoreResult<()> {
    /// store.bind("docs").await?;
    /// let keys = store.scoped(|h| Box::pin(async move { h.list(None).await })).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<T, F>(mut self, body: F) -> StoreResult<T>
    where
        F: for<'a> FnOnce(&'a mut Self) -> BoxFuture<'a, StoreResult<T>>,
    {
        let result = body(&mut self).await;
        let closed = self.close().await;
        match result {
            Ok(value) => closed.map(|()| value),
            Err(err) => {
                if let Err(close_err) = closed {
                    warn!("Close after failed operation also failed: {}", close_err);
                }
                Err(err)
            }
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// The live connection, opened on first use
    async fn connection(&mut self) -> StoreResult<Arc<dyn BlobBackend>> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }
        let credentials = self.credentials.as_ref().ok_or(StoreError::Closed)?;
        let connection = self.connector.connect(credentials).await?;
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    async fn lookup(&mut self, container_name: &str) -> StoreResult<Container> {
        let backend = self.connection().await?;
        if !backend.container_exists(container_name).await? {
            return Err(StoreError::ContainerNotFound {
                name: container_name.to_string(),
            });
        }
        Ok(Container {
            name: container_name.to_string(),
            backend,
        })
    }

    async fn release_connection(&mut self) -> StoreResult<()> {
        self.binding = None;
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
        }
        Ok(())
    }
}

impl<C> fmt::Display for ContainerHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.credentials {
            Some(credentials) => write!(f, "ContainerHandle({})", credentials)?,
            None => write!(f, "ContainerHandle(closed)")?,
        }
        if let Some(container) = &self.binding {
            write!(f, " with container {}", container.name)?;
        }
        Ok(())
    }
}

impl<C> fmt::Debug for ContainerHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerHandle")
            .field("credentials", &self.credentials)
            .field("connected", &self.connection.is_some())
            .field("binding", &self.binding)
            .finish()
    }
}

/// Dropping only releases this handle's reference to the connection;
/// `BlobBackend::close` is async and runs only through `close` or `scoped`.
impl<C> Drop for ContainerHandle<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!("ContainerHandle dropped without close(); releasing connection");
        }
        self.credentials = None;
        self.binding = None;
        self.connection = None;
    }
}

fn checked_name(name: &str) -> StoreResult<&str> {
    if name.trim().is_empty() {
        return Err(StoreError::invalid_name(name));
    }
    Ok(name)
}

fn target_key(explicit: Option<&str>, fallback: Option<String>) -> StoreResult<String> {
    match explicit {
        Some(name) => checked_name(name).map(str::to_string),
        None => fallback.ok_or_else(|| StoreError::invalid_name("")),
    }
}

fn receipt(operation: Operation, container: &Container, key: String, result: PutResult) -> Receipt {
    let receipt = Receipt::new(operation, container.name.clone(), key, result.size_bytes);
    match result.etag {
        Some(etag) => receipt.with_etag(etag),
        None => receipt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_are_unique() {
        let mut ops = OPERATIONS.to_vec();
        ops.sort_unstable();
        ops.dedup();
        assert_eq!(ops.len(), OPERATIONS.len());
    }

    #[test]
    fn explicit_key_wins_over_fallback() {
        assert_eq!(target_key(Some("x"), Some("y".into())).unwrap(), "x");
        assert_eq!(target_key(None, Some("y".into())).unwrap(), "y");
        assert!(matches!(target_key(Some(" "), None), Err(StoreError::InvalidName { .. })));
        assert!(matches!(target_key(None, None), Err(StoreError::InvalidName { .. })));
    }

    #[test]
    fn blank_names_are_rejected() {
        assert_eq!(checked_name("a.bin").unwrap(), "a.bin");
        assert!(matches!(checked_name(""), Err(StoreError::InvalidName { .. })));
        assert!(matches!(checked_name("  "), Err(StoreError::InvalidName { .. })));
    }

    #[test]
    fn display_hides_secret() {
        let handle = ContainerHandle::new(
            crate::MemoryConnector::new(),
            Credentials::new("access", "secret"),
        );
        assert_eq!(
            handle.to_string(),
            "ContainerHandle(access_key=access, secret_key=<secret_key>)"
        );
    }
}
