use thiserror::Error;

use crate::types::StreamMode;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during container handle operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Container is not set: bind a container or pass one explicitly")]
    NotBound,

    #[error("File {key} not found in {container}")]
    NotFound { key: String, container: String },

    #[error("Stream opened as '{actual}' but this operation needs a binary {required} stream")]
    Mode {
        required: &'static str,
        actual: StreamMode,
    },

    #[error("Invalid stream mode: {mode:?}")]
    InvalidMode { mode: String },

    #[error("Invalid blob name: {name:?}")]
    InvalidName { name: String },

    #[error("Container not found: {name}")]
    ContainerNotFound { name: String },

    #[error("Handle has been closed")]
    Closed,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Connection to storage backend failed: {source}")]
    Connection {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Blob content is not valid base64: {source}")]
    Decode {
        #[from]
        source: base64::DecodeError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create a connection error from any error type
    pub fn connection<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Connection {
            source: error.into(),
        }
    }

    pub fn not_found<K: Into<String>, C: Into<String>>(key: K, container: C) -> Self {
        Self::NotFound {
            key: key.into(),
            container: container.into(),
        }
    }

    pub fn invalid_name<S: Into<String>>(name: S) -> Self {
        Self::InvalidName { name: name.into() }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for the "key does not exist" case
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_key_and_container() {
        let err = StoreError::not_found("a.bin", "docs");
        assert_eq!(err.to_string(), "File a.bin not found in docs");
        assert!(err.is_not_found());
    }

    #[test]
    fn mode_error_reports_actual_mode() {
        let err = StoreError::Mode {
            required: "read",
            actual: "r".parse().unwrap(),
        };
        assert!(err.to_string().contains("'r'"));
        assert!(err.to_string().contains("binary read"));
    }

    #[test]
    fn base64_errors_convert_to_decode() {
        use base64::Engine;

        let source = base64::engine::general_purpose::STANDARD.decode("not base64!").unwrap_err();
        let err: StoreError = source.into();
        assert!(matches!(err, StoreError::Decode { .. }));
    }
}
