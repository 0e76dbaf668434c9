//! # fuga-store: a container handle for S3-compatible object storage
//!
//! `fuga-store` wraps an S3-compatible object store (the Fuga object store by
//! default) behind a single [`ContainerHandle`]. The handle owns the
//! credentials and at most one bound container, and checks every
//! precondition before anything reaches the backend:
//!
//! - an operation needs a container: explicit name, or the bound one
//! - uploads read from binary-read streams, downloads write to binary-write streams
//! - blob names must not be empty
//! - missing keys are reported as [`StoreError::NotFound`]
//!
//! ## Quick Start
//!
//! ```rust
//! use fuga_store::prelude::*;
//! use std::io::Cursor;
//!
//! # #[tokio::main]
//! # async fn main() -> StoreResult<()> {
//! let backend = MemoryConnector::new().with_container("docs");
//! let mut store = ContainerHandle::new(backend, Credentials::new("access", "secret"));
//! store.bind("docs").await?;
//!
//! let mut local = LocalFile::new(Cursor::new(vec![0u8, 1, 2]), StreamMode::READ_BINARY);
//! store.upload(&mut local, None, Some("a.bin")).await?;
//!
//! assert_eq!(store.list(None).await?, vec!["a.bin"]);
//! let encoded = store.get("a.bin", None, Encoding::Base64).await?;
//! assert_eq!(encoded.as_base64(), Some("AAEC"));
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  ContainerHandle │  ← lifecycle, validation, encoding
//! ├──────────────────┤
//! │    Connector     │  ← credentials → live connection
//! ├──────────────────┤
//! │   BlobBackend    │  ← S3 (aws-sdk-s3) or in-memory
//! └──────────────────┘
//! ```
//!
//! Handles are released with [`ContainerHandle::close`] or by running the work
//! inside [`ContainerHandle::scoped`], which closes on every exit path.

mod config;
mod error;
pub mod handle;
mod memory;
mod receipt;
mod s3_store;
pub mod store;
mod types;

pub use config::{Credentials, StoreConfig, DEFAULT_ENDPOINT_URL, DEFAULT_REGION};
pub use error::{StoreError, StoreResult};
pub use handle::{Container, ContainerHandle, OPERATIONS};
pub use memory::{MemoryBackend, MemoryConnector};
pub use receipt::{Operation, Receipt};
pub use s3_store::{S3Backend, S3Connector};
pub use store::{BlobBackend, Connector, PutResult};
pub use types::{BlobContent, Encoding, IncomingFile, LocalFile, StreamMode};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobContent, Container, ContainerHandle, Credentials, Encoding, IncomingFile, LocalFile,
        MemoryConnector, Receipt, StoreConfig, StoreError, StoreResult, StreamMode,
    };
}
