use std::env;
use std::fmt;

use crate::{StoreError, StoreResult};

pub const DEFAULT_ENDPOINT_URL: &str = "https://object.api.fuga.io";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Access key / secret key pair. The secret never appears in `Debug` or
/// `Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new<A: Into<String>, S: Into<String>>(access_key: A, secret_key: S) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<secret_key>")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access_key={}, secret_key=<secret_key>",
            self.access_key
        )
    }
}

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub credentials: Credentials,

    pub endpoint_url: String,

    /// Signing region. S3-compatible stores mostly accept any value.
    pub region: String,

    /// Path-style (`host/bucket/key`) rather than virtual-hosted addressing
    pub force_path_style: bool,
}

impl StoreConfig {
    /// Create a config for the default endpoint
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            region: DEFAULT_REGION.to_string(),
            force_path_style: true,
        }
    }

    /// Load from `FUGA_*` environment variables.
    ///
    /// `FUGA_ACCESS_KEY_ID` and `FUGA_SECRET_ACCESS_KEY` are required;
    /// `FUGA_ENDPOINT_URL`, `FUGA_REGION` and `FUGA_FORCE_PATH_STYLE` are optional.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StoreError::config(format!("{} environment variable required", key)))
        };

        let mut config = Self::new(Credentials::new(
            required("FUGA_ACCESS_KEY_ID")?,
            required("FUGA_SECRET_ACCESS_KEY")?,
        ));

        if let Some(endpoint) = lookup("FUGA_ENDPOINT_URL") {
            config = config.with_endpoint_url(endpoint);
        }
        if let Some(region) = lookup("FUGA_REGION") {
            config = config.with_region(region);
        }
        if let Some(path_style) = lookup("FUGA_FORCE_PATH_STYLE") {
            let path_style = path_style.parse::<bool>().map_err(|_| {
                StoreError::config(format!(
                    "FUGA_FORCE_PATH_STYLE must be true or false, got {:?}",
                    path_style
                ))
            })?;
            config = config.with_path_style(path_style);
        }

        Ok(config)
    }

    pub fn with_endpoint_url<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }
}
