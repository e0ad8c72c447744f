//! Centrally managed configuration read from a JSON file in a GitHub repository.
//!
//! [`ConfigClient`] loads the file once at construction, keeps an immutable
//! [`Snapshot`] of it in memory, and re-fetches it on a fixed interval from a
//! background Tokio task. Accessors return typed values or a [`ConfigError`];
//! nothing in the crate aborts the host process.
//!
//! ```no_run
//! use std::time::Duration;
//! use repo_config::{ClientConfig, ConfigClient};
//!
//! # async fn run() -> Result<(), repo_config::ConfigError> {
//! let config = ClientConfig::new(
//!     "ghp_token",
//!     "acme",
//!     "settings",
//!     "services/api.json",
//!     Duration::from_secs(60),
//! );
//! let client = ConfigClient::new(config).await?;
//! let retries = client.get_as_int("retries")?;
//! let hosts = client.get_as_string_array("hosts")?;
//! # let _ = (retries, hosts);
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod github;
mod refresh;
pub mod snapshot;
pub mod source;
pub mod status;
#[cfg(test)]
mod test_support;

pub use client::ConfigClient;
pub use config::{ClientConfig, Credential, FileLocation, RefreshFailurePolicy};
pub use error::ConfigError;
pub use github::{GithubSource, HttpError};
pub use snapshot::Snapshot;
pub use source::{ContentEncoding, ContentSource, RemoteContent};
pub use status::{RefreshStatus, StatusSnapshot};
