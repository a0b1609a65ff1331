//! 媒体数据模块 — data URI 解析与模态定义
//!
//! Media blobs carried as `data:` URIs, and the modalities a model call may
//! request.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output (or input) modality of a model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// Name used in Gemini `responseModalities`.
    pub fn gemini_name(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Audio => "AUDIO",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of blob a media field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }

    /// MIME type prefix shared by every type of this kind (e.g. `image/`).
    pub fn mime_prefix(&self) -> &'static str {
        match self {
            Self::Image => "image/",
            Self::Audio => "audio/",
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Self::Image => Modality::Image,
            Self::Audio => Modality::Audio,
        }
    }

    pub fn matches(&self, mime_type: &str) -> bool {
        mime_type.starts_with(self.mime_prefix())
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a string is not a usable media blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("not a data URI (expected 'data:<mimetype>;base64,<data>')")]
    NotDataUri,
    #[error("missing MIME type")]
    MissingMimeType,
    #[error("only base64-encoded data URIs are supported")]
    NotBase64,
    #[error("empty payload")]
    Empty,
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
    #[error("expected {expected} data, got '{actual}'")]
    WrongKind { expected: MediaKind, actual: String },
    #[error("unrecognised media type for '{0}'")]
    UnknownExtension(String),
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
}

/// A parsed `data:<mimetype>;base64,<payload>` URI.
///
/// The payload is kept in its base64 text form since that is what the model
/// service expects on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Parse and check a data URI. The payload must be valid, non-empty base64.
    pub fn parse(uri: &str) -> Result<Self, MediaError> {
        let rest = uri
            .trim()
            .strip_prefix("data:")
            .ok_or(MediaError::NotDataUri)?;
        let (header, data) = rest.split_once(',').ok_or(MediaError::NotDataUri)?;

        let mut params = header.split(';');
        let mime_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(MediaError::MissingMimeType);
        }
        if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
            return Err(MediaError::NotBase64);
        }

        let data = data.trim();
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| MediaError::InvalidBase64(e.to_string()))?;

        Ok(Self {
            mime_type,
            data: data.to_string(),
        })
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Build from raw base64 text returned by a model service.
    pub fn from_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file and guess its MIME type from the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        let mime_type = guess_media_type(path)
            .ok_or_else(|| MediaError::UnknownExtension(path.display().to_string()))?;
        let bytes = std::fs::read(path).map_err(|e| MediaError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::from_bytes(mime_type, &bytes))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn kind(&self) -> Option<MediaKind> {
        [MediaKind::Image, MediaKind::Audio]
            .into_iter()
            .find(|k| k.matches(&self.mime_type))
    }

    pub fn decode(&self) -> Result<Vec<u8>, MediaError> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| MediaError::InvalidBase64(e.to_string()))
    }

    /// Fail unless this blob is of the given kind.
    pub fn expect_kind(self, expected: MediaKind) -> Result<Self, MediaError> {
        if expected.matches(&self.mime_type) {
            Ok(self)
        } else {
            Err(MediaError::WrongKind {
                expected,
                actual: self.mime_type,
            })
        }
    }
}

impl FromStr for DataUri {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

fn guess_media_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_uri() {
        let uri = DataUri::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(uri.mime_type(), "image/png");
        assert_eq!(uri.data(), "iVBORw0KGgo=");
        assert_eq!(uri.kind(), Some(MediaKind::Image));
        assert_eq!(uri.to_string(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            DataUri::parse("https://example.com/a.png"),
            Err(MediaError::NotDataUri)
        );
        assert_eq!(DataUri::parse("data:;base64,AAAA"), Err(MediaError::MissingMimeType));
        assert_eq!(DataUri::parse("data:text/plain,hello"), Err(MediaError::NotBase64));
        assert_eq!(DataUri::parse("data:audio/wav;base64,"), Err(MediaError::Empty));
        assert!(matches!(
            DataUri::parse("data:audio/wav;base64,@@@"),
            Err(MediaError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_parameters_before_base64() {
        let uri: DataUri = "data:audio/webm;codecs=opus;base64,GkXfo0A="
            .parse()
            .unwrap();
        assert_eq!(uri.mime_type(), "audio/webm");
        assert_eq!(uri.kind(), Some(MediaKind::Audio));
    }

    #[test]
    fn test_expect_kind() {
        let uri = DataUri::from_bytes("image/jpeg", b"\xff\xd8\xff");
        assert!(uri.clone().expect_kind(MediaKind::Image).is_ok());
        let err = uri.expect_kind(MediaKind::Audio).unwrap_err();
        assert_eq!(err.to_string(), "expected audio data, got 'image/jpeg'");
    }

    #[test]
    fn test_bytes_round_trip() {
        let uri = DataUri::from_bytes("audio/wav", b"RIFF");
        assert_eq!(uri.decode().unwrap(), b"RIFF");
    }

    #[test]
    fn test_guess_media_type() {
        assert_eq!(guess_media_type(Path::new("page.JPG")), Some("image/jpeg"));
        assert_eq!(guess_media_type(Path::new("reading.m4a")), Some("audio/mp4"));
        assert_eq!(guess_media_type(Path::new("notes.txt")), None);
    }
}
