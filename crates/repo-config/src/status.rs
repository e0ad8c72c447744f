//! Fetch health tracking exposed to embedders.
//!
//! Counts successful and failed fetches and remembers the last error so a
//! host can report whether it is serving stale configuration.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Counters and last-error slot updated by every fetch.
#[derive(Debug, Default)]
pub struct RefreshStatus {
    successful_fetches: AtomicU64,
    failed_fetches: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl RefreshStatus {
    /// Creates a tracker with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful install and clears the last error.
    pub(crate) fn record_success(&self) {
        self.successful_fetches.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn record_failure(&self, error: &str) {
        self.failed_fetches.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }

    /// Number of fetches that installed a snapshot.
    pub fn successful_fetches(&self) -> u64 {
        self.successful_fetches.load(Ordering::Relaxed)
    }

    /// Number of fetches that failed.
    pub fn failed_fetches(&self) -> u64 {
        self.failed_fetches.load(Ordering::Relaxed)
    }

    /// Returns the error of the most recent fetch, or `None` if it succeeded.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns a status snapshot suitable for logging/exporting.
    pub fn snapshot(&self, revision: u64) -> StatusSnapshot {
        StatusSnapshot {
            revision,
            successful_fetches: self.successful_fetches(),
            failed_fetches: self.failed_fetches(),
            last_error: self.last_error(),
        }
    }
}

/// Point-in-time copy of [`RefreshStatus`] plus the installed snapshot revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub revision: u64,
    pub successful_fetches: u64,
    pub failed_fetches: u64,
    pub last_error: Option<String>,
}

impl StatusSnapshot {
    /// Renders the snapshot as a JSON map.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("revision".into(), Value::from(self.revision));
        map.insert(
            "successfulFetches".into(),
            Value::from(self.successful_fetches),
        );
        map.insert("failedFetches".into(), Value::from(self.failed_fetches));
        map.insert(
            "lastError".into(),
            match &self.last_error {
                Some(err) => Value::String(err.clone()),
                None => Value::Null,
            },
        );
        map
    }

    /// Renders the snapshot as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }
}
