//! Abstraction over the remote store holding the configuration document.
//!
//! The client only needs one capability from the remote side: given a file
//! location, return the file content as the store transmits it. Decoding the
//! transport encoding is done here so every source shares the same rules.

use std::fmt::Debug;

use async_trait::async_trait;
use base64::Engine;

use crate::config::FileLocation;
use crate::error::ConfigError;

/// Transport encoding applied by the remote store to the file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// Standard base64, possibly wrapped over several lines.
    Base64,
    /// Content is the file text itself.
    None,
}

impl ContentEncoding {
    /// Maps the encoding label reported by the store. Unknown labels are returned as `Err`.
    pub fn from_label(label: &str) -> Result<Self, ConfigError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "base64" => Ok(Self::Base64),
            "" | "none" | "utf-8" | "utf8" => Ok(Self::None),
            other => Err(ConfigError::Decode(format!(
                "unsupported content encoding {other:?}"
            ))),
        }
    }
}

/// File content as returned by a [`ContentSource`], still transport-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContent {
    pub content: String,
    pub encoding: ContentEncoding,
    /// Blob identifier of the fetched revision, when the store provides one.
    pub sha: Option<String>,
}

impl RemoteContent {
    /// Builds unencoded content, mostly useful for in-memory sources.
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            encoding: ContentEncoding::None,
            sha: None,
        }
    }

    /// Decodes the transport encoding and returns the raw file bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ConfigError> {
        match self.encoding {
            ContentEncoding::None => Ok(self.content.as_bytes().to_vec()),
            ContentEncoding::Base64 => {
                // GitHub wraps base64 payloads every 60 columns.
                let compact: String = self
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                base64::engine::general_purpose::STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|err| ConfigError::Decode(err.to_string()))
            }
        }
    }
}

/// Remote capability returning the content of one file.
///
/// Implementations handle authentication and reference resolution
/// themselves; the client treats every error they return as a failed fetch.
#[async_trait]
pub trait ContentSource: Debug + Send + Sync {
    async fn fetch(&self, location: &FileLocation) -> Result<RemoteContent, ConfigError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(br#"{"name": "svc"}"#);
        let (head, tail) = encoded.split_at(8);
        let content = RemoteContent {
            content: format!("{head}\n{tail}\n"),
            encoding: ContentEncoding::Base64,
            sha: Some("abc".into()),
        };
        assert_eq!(content.decode().unwrap(), br#"{"name": "svc"}"#.to_vec());
    }

    #[test]
    fn rejects_corrupt_base64() {
        let content = RemoteContent {
            content: "not*base64".into(),
            encoding: ContentEncoding::Base64,
            sha: None,
        };
        assert!(matches!(content.decode(), Err(ConfigError::Decode(_))));
    }

    #[test]
    fn plain_content_passes_through() {
        let content = RemoteContent::plain("{}");
        assert_eq!(content.decode().unwrap(), b"{}".to_vec());
    }

    #[test]
    fn encoding_labels() {
        assert_eq!(ContentEncoding::from_label("base64").unwrap(), ContentEncoding::Base64);
        assert_eq!(ContentEncoding::from_label(" BASE64 ").unwrap(), ContentEncoding::Base64);
        assert_eq!(ContentEncoding::from_label("").unwrap(), ContentEncoding::None);
        assert!(matches!(
            ContentEncoding::from_label("gzip"),
            Err(ConfigError::Decode(_))
        ));
    }
}
