//! Public configuration client.
//!
//! A [`ConfigClient`] performs one fetch while it is being constructed and
//! then keeps the snapshot fresh from a background task. Readers call the
//! accessors from any thread; they only take a short read lock to clone the
//! current `Arc<Snapshot>` and never wait on network I/O.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, FileLocation, RefreshFailurePolicy};
use crate::error::ConfigError;
use crate::github::GithubSource;
use crate::refresh::ClientShared;
use crate::snapshot::Snapshot;
use crate::source::ContentSource;
use crate::status::StatusSnapshot;

/// Handle over a remotely hosted JSON configuration document.
pub struct ConfigClient {
    shared: Arc<ClientShared>,
    refresh_interval: Duration,
    /// Cancels the refresh task; also fired on drop.
    shutdown: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigClient")
            .field("shared", &self.shared)
            .field("refresh_interval", &self.refresh_interval)
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl ConfigClient {
    /// Connects to GitHub with the given configuration.
    ///
    /// Validates `config`, loads the document once, and starts the refresh
    /// task. Any failure of the first load is returned to the caller, which
    /// decides whether to abort, retry, or run without remote configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = GithubSource::from_config(&config)?;
        Self::with_source(
            Arc::new(source),
            config.location,
            config.refresh_interval,
            config.refresh_failure_policy,
        )
        .await
    }

    /// Same lifecycle as [`ConfigClient::new`] with a caller-provided content source.
    ///
    /// A zero `refresh_interval` disables background refreshing; the
    /// snapshot then only changes through [`ConfigClient::refresh_now`].
    pub async fn with_source(
        source: Arc<dyn ContentSource>,
        location: FileLocation,
        refresh_interval: Duration,
        policy: RefreshFailurePolicy,
    ) -> Result<Self, ConfigError> {
        let shared = Arc::new(ClientShared::new(source, location));

        if let Err(err) = shared.fetch().await {
            warn!(
                location = %shared.location,
                error = %err,
                "repo-config initial fetch failed"
            );
            return Err(err);
        }

        let shutdown = CancellationToken::new();
        let refresh_task = if refresh_interval.is_zero() {
            debug!(location = %shared.location, "repo-config background refresh disabled");
            None
        } else {
            let loop_shared = Arc::clone(&shared);
            Some(tokio::spawn(loop_shared.run_refresh_loop(
                refresh_interval,
                policy,
                shutdown.clone(),
            )))
        };

        info!(
            location = %shared.location,
            refresh_interval_secs = refresh_interval.as_secs_f64(),
            ?policy,
            "repo-config client started"
        );

        Ok(Self {
            shared,
            refresh_interval,
            shutdown,
            refresh_task: Mutex::new(refresh_task),
        })
    }

    /// Repository file this client reads.
    pub fn location(&self) -> &FileLocation {
        &self.shared.location
    }

    /// Delay between background refreshes.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Returns the current snapshot.
    ///
    /// Use this to read several keys from one consistent document.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.current()
    }

    /// Returns the value stored under `key`, or `None` when the key is absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.snapshot().get(key).cloned()
    }

    /// Reads a string value. See [`Snapshot::get_as_string`].
    pub fn get_as_string(&self, key: &str) -> Result<String, ConfigError> {
        self.snapshot().get_as_string(key)
    }

    /// Reads any number as `f64`.
    pub fn get_as_float(&self, key: &str) -> Result<f64, ConfigError> {
        self.snapshot().get_as_float(key)
    }

    /// Reads a number truncated toward zero. See [`Snapshot::get_as_int`].
    pub fn get_as_int(&self, key: &str) -> Result<i64, ConfigError> {
        self.snapshot().get_as_int(key)
    }

    /// Reads a boolean value.
    pub fn get_as_bool(&self, key: &str) -> Result<bool, ConfigError> {
        self.snapshot().get_as_bool(key)
    }

    /// Reads an array of strings.
    pub fn get_as_string_array(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        self.snapshot().get_as_string_array(key)
    }

    /// Reads an array of numbers as `f64`.
    pub fn get_as_float_array(&self, key: &str) -> Result<Vec<f64>, ConfigError> {
        self.snapshot().get_as_float_array(key)
    }

    /// Reads an array of numbers, each truncated toward zero.
    pub fn get_as_int_array(&self, key: &str) -> Result<Vec<i64>, ConfigError> {
        self.snapshot().get_as_int_array(key)
    }

    /// Fetches the document immediately and installs it on success.
    ///
    /// Waits for any fetch already in flight. On failure the previous
    /// snapshot keeps being served.
    pub async fn refresh_now(&self) -> Result<Arc<Snapshot>, ConfigError> {
        self.shared.fetch().await
    }

    /// Fetch counters, last error, and the revision currently served.
    pub fn status(&self) -> StatusSnapshot {
        self.shared.status.snapshot(self.snapshot().revision())
    }

    /// Returns true while the background refresh task is running.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the refresh task and waits for it to terminate.
    ///
    /// Accessors keep serving the last snapshot afterwards.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("repo-config refresh task ended abnormally: {err}");
            }
        }
        debug!(location = %self.shared.location, "repo-config client shut down");
    }
}

impl Drop for ConfigClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
