//! Error taxonomy surfaced by the configuration client.

use crate::github::HttpError;

/// Errors produced while fetching, decoding, parsing, or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The remote content source failed (network, permissions, not found).
    #[error("remote fetch failed: {0}")]
    Http(#[from] HttpError),

    /// The fetched content could not be decoded from its transport encoding.
    #[error("failed to decode remote content: {0}")]
    Decode(String),

    /// The decoded bytes are not valid JSON.
    #[error("invalid JSON document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document is valid JSON but its top level is not an object.
    #[error("configuration document must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// A typed accessor was used on an absent key or a value of another type.
    #[error("config key {key:?}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConfigError {
    /// Returns true when the error comes from reading a key that is not in the snapshot.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Self::TypeMismatch { found, .. } if *found == ABSENT)
    }

    /// Returns true for errors raised while producing a snapshot (as opposed to reading one).
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Decode(_) | Self::Parse(_) | Self::NotAnObject { .. }
        )
    }
}

/// Type label reported in [`ConfigError::TypeMismatch`] for keys that are not present.
pub(crate) const ABSENT: &str = "absent";
