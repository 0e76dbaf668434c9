use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Serialize, Serializer};

use crate::{StoreError, StoreResult};

/// How a local stream was opened, parsed from `open()`-style mode strings
/// such as `"rb"`, `"wb"`, `"a"` or `"r+b"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMode {
    kind: OpenKind,
    update: bool,
    binary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Read,
    Write,
    Append,
    Exclusive,
}

impl StreamMode {
    pub const READ_BINARY: Self = Self {
        kind: OpenKind::Read,
        update: false,
        binary: true,
    };

    pub const WRITE_BINARY: Self = Self {
        kind: OpenKind::Write,
        update: false,
        binary: true,
    };

    pub const READ_TEXT: Self = Self {
        kind: OpenKind::Read,
        update: false,
        binary: false,
    };

    pub const WRITE_TEXT: Self = Self {
        kind: OpenKind::Write,
        update: false,
        binary: false,
    };

    pub fn is_readable(&self) -> bool {
        self.kind == OpenKind::Read || self.update
    }

    pub fn is_writable(&self) -> bool {
        self.kind != OpenKind::Read || self.update
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Binary and readable: what an upload needs
    pub fn can_upload_from(&self) -> bool {
        self.binary && self.is_readable()
    }

    /// Binary and writable: what a download needs
    pub fn can_download_to(&self) -> bool {
        self.binary && self.is_writable()
    }

    fn open_options(&self) -> tokio::fs::OpenOptions {
        let mut options = tokio::fs::OpenOptions::new();
        options.read(self.is_readable());
        match self.kind {
            OpenKind::Read => {
                options.write(self.update);
            }
            OpenKind::Write => {
                options.write(true).create(true).truncate(true);
            }
            OpenKind::Append => {
                options.append(true).create(true);
            }
            OpenKind::Exclusive => {
                options.write(true).create_new(true);
            }
        }
        options
    }
}

impl FromStr for StreamMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidMode { mode: s.to_string() };

        let mut chars = s.chars();
        let kind = match chars.next() {
            Some('r') => OpenKind::Read,
            Some('w') => OpenKind::Write,
            Some('a') => OpenKind::Append,
            Some('x') => OpenKind::Exclusive,
            _ => return Err(invalid()),
        };

        let (mut update, mut binary, mut text) = (false, false, false);
        for c in chars {
            let flag = match c {
                '+' => &mut update,
                'b' => &mut binary,
                't' => &mut text,
                _ => return Err(invalid()),
            };
            if *flag {
                return Err(invalid());
            }
            *flag = true;
        }
        if binary && text {
            return Err(invalid());
        }

        Ok(Self { kind, update, binary })
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            OpenKind::Read => "r",
            OpenKind::Write => "w",
            OpenKind::Append => "a",
            OpenKind::Exclusive => "x",
        };
        write!(f, "{}", kind)?;
        if self.update {
            write!(f, "+")?;
        }
        if self.binary {
            write!(f, "b")?;
        }
        Ok(())
    }
}

/// A caller-owned local byte stream together with the mode it was opened in.
///
/// `S` is any tokio `AsyncRead` (for uploads) or `AsyncWrite` (for downloads).
/// The optional name is used to derive the remote key when none is given.
#[derive(Debug)]
pub struct LocalFile<S> {
    name: Option<String>,
    mode: StreamMode,
    inner: S,
}

impl<S> LocalFile<S> {
    pub fn new(inner: S, mode: StreamMode) -> Self {
        Self {
            name: None,
            mode,
            inner,
        }
    }

    pub fn with_name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Final path component of the name, if any
    pub fn base_name(&self) -> Option<String> {
        self.name.as_deref().and_then(base_name)
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl LocalFile<tokio::fs::File> {
    /// Open a file on disk with an `open()`-style mode string
    pub async fn open<P: AsRef<Path>>(path: P, mode: &str) -> StoreResult<Self> {
        let mode: StreamMode = mode.parse()?;
        let path = path.as_ref();
        let file = mode.open_options().open(path).await?;
        Ok(Self::new(file, mode).with_name(path.to_string_lossy()))
    }
}

/// A named upload handed over by some ingress layer (e.g. a multipart form
/// field), already buffered in memory.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl IncomingFile {
    pub fn new<N: Into<String>, D: Into<Bytes>>(filename: N, data: D) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// How `get` should hand back blob contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Raw bytes
    Binary,
    /// Standard base64 text, safe to embed in JSON
    #[default]
    Base64,
}

/// Blob contents as returned by `get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobContent {
    Binary(Bytes),
    Base64(String),
}

impl BlobContent {
    pub fn encode(data: Bytes, encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::Binary(data),
            Encoding::Base64 => Self::Base64(STANDARD.encode(&data)),
        }
    }

    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(data) => Some(data),
            Self::Base64(_) => None,
        }
    }

    pub fn as_base64(&self) -> Option<&str> {
        match self {
            Self::Binary(_) => None,
            Self::Base64(text) => Some(text),
        }
    }

    /// Raw bytes, decoding base64 if needed
    pub fn to_bytes(&self) -> StoreResult<Bytes> {
        match self {
            Self::Binary(data) => Ok(data.clone()),
            Self::Base64(text) => Ok(Bytes::from(STANDARD.decode(text)?)),
        }
    }
}

impl Serialize for BlobContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Binary(data) => serializer.serialize_bytes(data),
            Self::Base64(text) => serializer.serialize_str(text),
        }
    }
}

/// Final path component of `name`, or `None` when there is none
pub(crate) fn base_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_modes() {
        let rb: StreamMode = "rb".parse().unwrap();
        assert!(rb.can_upload_from());
        assert!(!rb.can_download_to());

        let wb: StreamMode = "wb".parse().unwrap();
        assert!(wb.can_download_to());
        assert!(!wb.can_upload_from());

        let rpb: StreamMode = "r+b".parse().unwrap();
        assert!(rpb.can_upload_from() && rpb.can_download_to());

        let r: StreamMode = "r".parse().unwrap();
        assert!(r.is_readable() && !r.is_binary());
        assert_eq!("rt".parse::<StreamMode>().unwrap(), r);
    }

    #[test]
    fn rejects_malformed_modes() {
        for mode in ["", "q", "rbb", "rbt", "b", "r++"] {
            assert!(
                matches!(mode.parse::<StreamMode>(), Err(StoreError::InvalidMode { .. })),
                "{mode:?} should be rejected"
            );
        }
    }

    #[test]
    fn displays_canonical_form() {
        assert_eq!("rb".parse::<StreamMode>().unwrap().to_string(), "rb");
        assert_eq!("wb+".parse::<StreamMode>().unwrap().to_string(), "w+b");
        assert_eq!(StreamMode::WRITE_TEXT.to_string(), "w");
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(base_name("/tmp/x/report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(base_name("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(base_name(""), None);
        assert_eq!(base_name("/"), None);

        let file = LocalFile::new(std::io::Cursor::new(Vec::<u8>::new()), StreamMode::READ_BINARY)
            .with_name("some/dir/a.bin");
        assert_eq!(file.base_name().as_deref(), Some("a.bin"));
    }

    #[test]
    fn base64_content_matches_standard_alphabet() {
        let content = BlobContent::encode(Bytes::from_static(&[0u8; 13]), Encoding::Base64);
        assert_eq!(content.as_base64(), Some("AAAAAAAAAAAAAAAAAA=="));
        assert_eq!(content.to_bytes().unwrap(), Bytes::from_static(&[0u8; 13]));
    }

    #[test]
    fn corrupt_base64_content_is_a_decode_error() {
        let content = BlobContent::Base64("@@@".to_string());
        assert!(matches!(content.to_bytes(), Err(StoreError::Decode { .. })));
    }

    #[test]
    fn base64_content_serializes_as_json_string() {
        let content = BlobContent::encode(Bytes::from_static(b"hi"), Encoding::Base64);
        assert_eq!(serde_json::to_string(&content).unwrap(), "\"aGk=\"");
    }
}
