//! Fetch pipeline and background refresh loop.
//!
//! [`ClientShared`] owns everything the refresh task needs: the content
//! source, the file location, the installed snapshot, and the status
//! counters. The public [`crate::ConfigClient`] and the spawned loop both hold
//! it through an `Arc`.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{FileLocation, RefreshFailurePolicy};
use crate::error::ConfigError;
use crate::snapshot::Snapshot;
use crate::source::ContentSource;
use crate::status::RefreshStatus;

/// State shared between the client handle and the refresh task.
pub(crate) struct ClientShared {
    source: Arc<dyn ContentSource>,
    pub(crate) location: FileLocation,
    /// Current snapshot. Held only to clone or replace the `Arc`, never across I/O.
    snapshot: RwLock<Arc<Snapshot>>,
    /// Serialises fetches so installs happen in request order.
    fetch_lock: Mutex<()>,
    pub(crate) status: RefreshStatus,
}

impl std::fmt::Debug for ClientShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientShared")
            .field("location", &self.location)
            .field("revision", &self.current().revision())
            .finish()
    }
}

impl ClientShared {
    pub(crate) fn new(source: Arc<dyn ContentSource>, location: FileLocation) -> Self {
        Self {
            source,
            location,
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            fetch_lock: Mutex::new(()),
            status: RefreshStatus::new(),
        }
    }

    /// Returns the installed snapshot.
    pub(crate) fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fetches, decodes, and parses the remote document, then installs it.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// recorded in the status counters.
    pub(crate) async fn fetch(&self) -> Result<Arc<Snapshot>, ConfigError> {
        let _guard = self.fetch_lock.lock().await;
        match self.load().await {
            Ok(snapshot) => {
                let installed = self.install(snapshot);
                self.status.record_success();
                Ok(installed)
            }
            Err(err) => {
                self.status.record_failure(&err.to_string());
                Err(err)
            }
        }
    }

    async fn load(&self) -> Result<Snapshot, ConfigError> {
        let remote = self.source.fetch(&self.location).await?;
        let bytes = remote.decode()?;
        let snapshot = Snapshot::parse(&bytes)?;
        Ok(snapshot.with_sha(remote.sha))
    }

    fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let installed = Arc::new(snapshot.with_revision(guard.revision() + 1));
        *guard = Arc::clone(&installed);
        drop(guard);

        info!(
            location = %self.location,
            revision = installed.revision(),
            keys = installed.len(),
            sha = installed.sha().unwrap_or("-"),
            "repo-config installed configuration snapshot"
        );
        installed
    }

    /// Runs the periodic refresh loop until `shutdown` fires.
    ///
    /// Each iteration sleeps for `interval` and then fetches. There is no
    /// jitter and no backoff; failures are handled according to `policy`.
    pub(crate) async fn run_refresh_loop(
        self: Arc<Self>,
        interval: Duration,
        policy: RefreshFailurePolicy,
        shutdown: CancellationToken,
    ) {
        debug!(
            location = %self.location,
            interval_secs = interval.as_secs_f64(),
            "repo-config refresh loop started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {}
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.fetch() => result,
            };

            if let Err(err) = result {
                match policy {
                    RefreshFailurePolicy::KeepLastGood => {
                        warn!(
                            location = %self.location,
                            error = %err,
                            revision = self.current().revision(),
                            "repo-config refresh failed; keeping last good configuration"
                        );
                    }
                    RefreshFailurePolicy::Stop => {
                        error!(
                            location = %self.location,
                            error = %err,
                            "repo-config refresh failed; stopping refresh loop"
                        );
                        break;
                    }
                }
            }
        }
        debug!(location = %self.location, "repo-config refresh loop stopped");
    }
}
