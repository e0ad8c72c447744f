//! Immutable view of one successfully fetched configuration document.
//!
//! A [`Snapshot`] is built once from the decoded bytes of the remote file and
//! never mutated afterwards. The client swaps whole snapshots, so every read
//! made through a single `Arc<Snapshot>` sees one consistent document.
//!
//! The typed accessors convert the dynamically typed JSON values into Rust
//! types and report a [`ConfigError::TypeMismatch`] instead of aborting when
//! the stored value has another shape.

use std::time::SystemTime;

use serde_json::{Map, Value};

use crate::error::{ConfigError, ABSENT};

/// Parsed configuration document plus the metadata of the fetch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Map<String, Value>,
    revision: u64,
    sha: Option<String>,
    fetched_at: SystemTime,
}

impl Snapshot {
    /// Parses a JSON document whose top level must be an object.
    ///
    /// The returned snapshot has revision 0; the client assigns the real
    /// revision when it installs the snapshot.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(values) => Ok(Self::from_map(values)),
            other => Err(ConfigError::NotAnObject {
                found: type_name(Some(&other)),
            }),
        }
    }

    /// Wraps an already-parsed JSON object.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            revision: 0,
            sha: None,
            fetched_at: SystemTime::now(),
        }
    }

    pub(crate) fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub(crate) fn with_sha(mut self, sha: Option<String>) -> Self {
        self.sha = sha;
        self
    }

    /// Snapshot with no keys, used before anything has been installed.
    pub(crate) fn empty() -> Self {
        Self::from_map(Map::new())
    }

    /// Monotonic install counter: 1 for the construction-time fetch, +1 per install.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Blob identifier reported by the content source, if any.
    pub fn sha(&self) -> Option<&str> {
        self.sha.as_deref()
    }

    /// Wall-clock time at which the document was parsed.
    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when the document has no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the top-level keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Returns true when `key` is present, whatever its value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Full key/value mapping of the document.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Returns the raw value stored under `key`, or `None` when absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Reads a string value.
    pub fn get_as_string(&self, key: &str) -> Result<String, ConfigError> {
        let value = self.get(key);
        as_string(value).ok_or_else(|| mismatch(key, "string", value))
    }

    /// Reads any JSON number as `f64`.
    pub fn get_as_float(&self, key: &str) -> Result<f64, ConfigError> {
        let value = self.get(key);
        as_float(value).ok_or_else(|| mismatch(key, "number", value))
    }

    /// Reads a number and truncates it toward zero (`3.9 -> 3`, `-3.9 -> -3`).
    ///
    /// Values beyond the `i64` range saturate at the nearest bound.
    pub fn get_as_int(&self, key: &str) -> Result<i64, ConfigError> {
        let value = self.get(key);
        as_int(value).ok_or_else(|| mismatch(key, "number", value))
    }

    /// Reads a boolean value.
    pub fn get_as_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let value = self.get(key);
        value
            .and_then(Value::as_bool)
            .ok_or_else(|| mismatch(key, "boolean", value))
    }

    /// Reads an array of strings, preserving order.
    ///
    /// A single element of another type fails the whole call.
    pub fn get_as_string_array(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        self.get_array(key, "array of strings", as_string)
    }

    /// Reads an array of numbers as `f64`, preserving order.
    pub fn get_as_float_array(&self, key: &str) -> Result<Vec<f64>, ConfigError> {
        self.get_array(key, "array of numbers", as_float)
    }

    /// Reads an array of numbers, truncating every element toward zero.
    pub fn get_as_int_array(&self, key: &str) -> Result<Vec<i64>, ConfigError> {
        self.get_array(key, "array of numbers", as_int)
    }

    fn get_array<T>(
        &self,
        key: &str,
        expected: &'static str,
        convert: fn(Option<&Value>) -> Option<T>,
    ) -> Result<Vec<T>, ConfigError> {
        let value = self.get(key);
        let items = value
            .and_then(Value::as_array)
            .ok_or_else(|| mismatch(key, expected, value))?;
        items
            .iter()
            .map(|item| convert(Some(item)).ok_or_else(|| mismatch(key, expected, Some(item))))
            .collect()
    }
}

fn as_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

fn as_float(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn as_int(value: Option<&Value>) -> Option<i64> {
    // Integral JSON numbers are taken exactly; `as` truncates toward zero and saturates.
    match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        _ => None,
    }
}

fn mismatch(key: &str, expected: &'static str, found: Option<&Value>) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: type_name(found),
    }
}

/// Short label for the JSON type of `value`, used in error messages.
pub(crate) fn type_name(value: Option<&Value>) -> &'static str {
    match value {
        None => ABSENT,
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
