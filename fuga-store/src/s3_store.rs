use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use bytes::Bytes;
use tracing::debug;

use crate::{BlobBackend, Connector, Credentials, PutResult, StoreConfig, StoreError, StoreResult};

/// Connects to an S3-compatible endpoint through the AWS SDK
#[derive(Debug, Clone)]
pub struct S3Connector {
    endpoint_url: String,
    region: String,
    force_path_style: bool,
}

impl S3Connector {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            region: config.region.clone(),
            force_path_style: config.force_path_style,
        }
    }

    async fn create_client(&self, credentials: &Credentials) -> Client {
        let credentials = aws_credential_types::Credentials::new(
            credentials.access_key(),
            credentials.secret_key(),
            None,
            None,
            "fuga-store",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&self.endpoint_url)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(self.force_path_style)
                .build(),
        )
    }
}

#[async_trait]
impl Connector for S3Connector {
    async fn connect(&self, credentials: &Credentials) -> StoreResult<Arc<dyn BlobBackend>> {
        if credentials.access_key().is_empty() || credentials.secret_key().is_empty() {
            return Err(StoreError::connection("access key and secret key are required"));
        }

        debug!("Connecting to {}", self.endpoint_url);
        let client = self.create_client(credentials).await;
        Ok(Arc::new(S3Backend { client }))
    }
}

/// A live S3 client
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    /// Wrap an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> StoreError {
        StoreError::backend(err)
    }
}

fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
    err.raw_response().map(|response| response.status().as_u16())
}

fn is_connection_failure<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)
    )
}

#[async_trait]
impl BlobBackend for S3Backend {
    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        debug!("HEAD bucket {}", container);

        match self.client.head_bucket().bucket(container).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err.as_service_error().map_or(false, |e| e.is_not_found());
                match status_of(&err) {
                    _ if not_found => Ok(false),
                    Some(404) => Ok(false),
                    Some(401) | Some(403) => Err(StoreError::connection(err)),
                    _ if is_connection_failure(&err) => Err(StoreError::connection(err)),
                    _ => Err(Self::map_aws_error(err)),
                }
            }
        }
    }

    async fn list_keys(&self, container: &str) -> StoreResult<Vec<String>> {
        debug!("LIST {}", container);

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(container)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(Self::map_aws_error)?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn exists(&self, container: &str, key: &str) -> StoreResult<bool> {
        debug!("HEAD {}/{}", container, key);

        match self.client.head_object().bucket(container).key(key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let not_found = err.as_service_error().map_or(false, |e| e.is_not_found());
                if not_found || status_of(&err) == Some(404) {
                    Ok(false)
                } else {
                    Err(Self::map_aws_error(err))
                }
            }
        }
    }

    async fn fetch(&self, container: &str, key: &str) -> StoreResult<Option<Bytes>> {
        debug!("GET {}/{}", container, key);

        let response = match self.client.get_object().bucket(container).key(key).send().await {
            Ok(response) => response,
            Err(err) => {
                let missing = err.as_service_error().map_or(false, |e| e.is_no_such_key());
                if missing || status_of(&err) == Some(404) {
                    return Ok(None);
                }
                return Err(Self::map_aws_error(err));
            }
        };

        let body = response.body.collect().await.map_err(Self::map_aws_error)?;
        Ok(Some(body.into_bytes()))
    }

    async fn store(
        &self,
        container: &str,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> StoreResult<PutResult> {
        debug!("PUT {}/{} ({} bytes)", container, key, data.len());

        let size_bytes = data.len() as u64;
        let mut request = self
            .client
            .put_object()
            .bucket(container)
            .key(key)
            .content_length(size_bytes as i64)
            .body(AwsByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn remove(&self, container: &str, key: &str) -> StoreResult<()> {
        debug!("DELETE {}/{}", container, key);

        self.client
            .delete_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        // The SDK client pools connections internally; dropping the last clone releases them.
        debug!("Closing S3 connection");
        Ok(())
    }
}
