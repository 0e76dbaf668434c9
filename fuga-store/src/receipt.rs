use std::fmt;

use serde::{Deserialize, Serialize};

/// Which handle operation produced a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upload,
    Download,
    Delete,
    Save,
}

/// Success marker returned by mutating operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub operation: Operation,
    pub container: String,
    pub key: String,
    pub size_bytes: u64,
    pub etag: Option<String>,
}

impl Receipt {
    pub fn new<C: Into<String>, K: Into<String>>(
        operation: Operation,
        container: C,
        key: K,
        size_bytes: u64,
    ) -> Self {
        Self {
            operation,
            container: container.into(),
            key: key.into(),
            size_bytes,
            etag: None,
        }
    }

    pub fn with_etag<S: Into<String>>(mut self, etag: S) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Operation::Delete => write!(f, "'{}' deleted", self.key),
            Operation::Save => write!(f, "successfully saved file"),
            Operation::Upload | Operation::Download => write!(f, "success"),
        }
    }
}
