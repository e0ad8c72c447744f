//! Client configuration and environment-driven helpers.
//!
//! [`ClientConfig::new`] takes the same inputs as the client constructor
//! (credential, owner, repository, file path, refresh interval) and fills the
//! remaining knobs with defaults. [`ClientConfig::from_os_env`] derives the
//! same structure from `REPO_CONFIG_*` variables for hosts that prefer
//! environment-based wiring.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable carrying the access token.
const ENV_TOKEN: &str = "REPO_CONFIG_TOKEN";
/// Fallback token variable, commonly set in CI environments.
const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const ENV_OWNER: &str = "REPO_CONFIG_OWNER";
const ENV_REPO: &str = "REPO_CONFIG_REPO";
const ENV_PATH: &str = "REPO_CONFIG_PATH";
/// Branch, tag, or commit to read. Unset means the repository default branch.
const ENV_REF: &str = "REPO_CONFIG_REF";
/// Refresh interval in whole seconds; zero or negative disables refreshing.
const ENV_REFRESH_SECS: &str = "REPO_CONFIG_REFRESH_SECS";
const ENV_API_URL: &str = "REPO_CONFIG_API_URL";
const ENV_TIMEOUT_SECS: &str = "REPO_CONFIG_TIMEOUT_SECS";
/// Either `keep_last_good` or `stop`.
const ENV_REFRESH_FAILURE: &str = "REPO_CONFIG_REFRESH_FAILURE";

/// Public GitHub REST API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Opaque access token. The value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token text, for building the request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true for an empty or whitespace-only token.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Where the configuration document lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    pub owner: String,
    pub repo: String,
    /// Path of the file inside the repository, `/`-separated.
    pub path: String,
    /// Git reference to read; `None` resolves the repository default branch.
    #[serde(default)]
    pub reference: Option<String>,
}

impl FileLocation {
    /// Location on the repository default branch.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
            reference: None,
        }
    }

    /// Pins a branch, tag, or commit.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.path)?;
        if let Some(reference) = &self.reference {
            write!(f, "@{reference}")?;
        }
        Ok(())
    }
}

/// What the background loop does when a refresh fails after construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshFailurePolicy {
    /// Log the failure, keep serving the last good snapshot, and keep polling.
    #[default]
    KeepLastGood,
    /// Log the failure and stop the refresh loop. The last snapshot stays readable.
    Stop,
}

impl RefreshFailurePolicy {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "keep_last_good" | "keep-last-good" | "keep" => Some(Self::KeepLastGood),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Everything needed to build a [`crate::ConfigClient`] backed by GitHub.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: Credential,
    pub location: FileLocation,
    /// Delay between background refreshes. `Duration::ZERO` disables them.
    pub refresh_interval: Duration,
    /// Base URL of the REST API (GitHub Enterprise installs use `https://host/api/v3`).
    pub api_base_url: String,
    /// Per-request timeout; `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
    pub refresh_failure_policy: RefreshFailurePolicy,
    /// Allows `http://` API base URLs. Intended for local test servers.
    pub allow_plaintext: bool,
}

impl ClientConfig {
    pub fn new(
        credential: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        path: impl Into<String>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            credential: Credential::new(credential),
            location: FileLocation::new(owner, repo, path),
            refresh_interval,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: None,
            refresh_failure_policy: RefreshFailurePolicy::default(),
            allow_plaintext: false,
        }
    }

    /// Builds settings from the current process environment.
    pub fn from_os_env() -> Result<Self, ConfigError> {
        Self::from_env_iter(env::vars())
    }

    /// Builds settings from an iterator of key/value pairs (typically for tests).
    ///
    /// Blank values are treated as unset. The result is validated before it
    /// is returned.
    pub fn from_env_iter<I, K, V>(iter: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let lookup = |name: &str| map.get(name).and_then(|value| sanitize_non_empty(value));

        // Prefer the dedicated token; fall back to the generic CI token.
        let token = lookup(ENV_TOKEN).or_else(|| lookup(ENV_GITHUB_TOKEN));
        let mut config = Self::new(
            token.unwrap_or_default(),
            lookup(ENV_OWNER).unwrap_or_default(),
            lookup(ENV_REPO).unwrap_or_default(),
            lookup(ENV_PATH).unwrap_or_default(),
            Duration::ZERO,
        );
        config.location.reference = lookup(ENV_REF);

        if let Some(raw) = lookup(ENV_REFRESH_SECS) {
            config.refresh_interval = parse_signed_secs(ENV_REFRESH_SECS, &raw)?;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let timeout = parse_signed_secs(ENV_TIMEOUT_SECS, &raw)?;
            config.request_timeout = (!timeout.is_zero()).then_some(timeout);
        }
        if let Some(raw) = lookup(ENV_REFRESH_FAILURE) {
            config.refresh_failure_policy =
                RefreshFailurePolicy::from_label(&raw).ok_or_else(|| {
                    ConfigError::InvalidConfig(format!(
                        "{ENV_REFRESH_FAILURE} must be keep_last_good or stop, got {raw:?}"
                    ))
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reads the file at a branch, tag, or commit instead of the default branch.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.location.reference = Some(reference.into());
        self
    }

    /// Overrides the REST API base URL.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Sets a per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Chooses what the refresh loop does after a failed fetch.
    pub fn with_refresh_failure_policy(mut self, policy: RefreshFailurePolicy) -> Self {
        self.refresh_failure_policy = policy;
        self
    }

    /// Permits an `http://` API base URL.
    pub fn with_allow_plaintext(mut self, allow: bool) -> Self {
        self.allow_plaintext = allow;
        self
    }

    /// Checks that every required field is present and the API URL is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credential.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "missing credential (set {ENV_TOKEN} or {ENV_GITHUB_TOKEN})"
            )));
        }
        let required = [
            ("owner", &self.location.owner),
            ("repository", &self.location.repo),
            ("file path", &self.location.path),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!("missing {label}")));
            }
        }
        let url = Url::parse(&self.api_base_url).map_err(|err| {
            ConfigError::InvalidConfig(format!(
                "invalid API base URL {:?}: {err}",
                self.api_base_url
            ))
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidConfig(format!(
                "API base URL {:?} cannot carry a path",
                self.api_base_url
            )));
        }
        Ok(())
    }
}

/// Helper trimming whitespace and discarding empty values.
fn sanitize_non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a whole number of seconds. Zero or negative values map to `Duration::ZERO`.
fn parse_signed_secs(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: i64 = raw.parse().map_err(|_| {
        ConfigError::InvalidConfig(format!("{name} must be a whole number of seconds, got {raw:?}"))
    })?;
    Ok(Duration::from_secs(secs.max(0).unsigned_abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_TOKEN, " token-123 "),
            (ENV_OWNER, "acme"),
            (ENV_REPO, "settings"),
            (ENV_PATH, "services/api.json"),
        ]
    }

    /// Ensures defaults apply when only the required variables are set.
    #[test]
    fn env_defaults() {
        let config = ClientConfig::from_env_iter(base_env()).unwrap();
        assert_eq!(config.credential.expose(), "token-123");
        assert_eq!(
            config.location,
            FileLocation::new("acme", "settings", "services/api.json")
        );
        assert_eq!(config.refresh_interval, Duration::ZERO);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.refresh_failure_policy, RefreshFailurePolicy::KeepLastGood);
        assert!(!config.allow_plaintext);
    }

    /// Confirms environment-derived settings respect overrides.
    #[test]
    fn env_overrides() {
        let mut env = base_env();
        env.extend([
            (ENV_REF, "release"),
            (ENV_REFRESH_SECS, "30"),
            (ENV_API_URL, "https://git.example.com/api/v3"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_REFRESH_FAILURE, "stop"),
        ]);
        let config = ClientConfig::from_env_iter(env).unwrap();
        assert_eq!(config.location.reference.as_deref(), Some("release"));
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.api_base_url, "https://git.example.com/api/v3");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.refresh_failure_policy, RefreshFailurePolicy::Stop);
    }

    #[test]
    fn negative_refresh_interval_disables_refresh() {
        let mut env = base_env();
        env.push((ENV_REFRESH_SECS, "-10"));
        let config = ClientConfig::from_env_iter(env).unwrap();
        assert!(config.refresh_interval.is_zero());
    }

    /// Verifies the fallback to `GITHUB_TOKEN` when no dedicated token is set.
    #[test]
    fn env_falls_back_to_github_token() {
        let config = ClientConfig::from_env_iter([
            (ENV_TOKEN, "   "),
            (ENV_GITHUB_TOKEN, "ci-token"),
            (ENV_OWNER, "acme"),
            (ENV_REPO, "settings"),
            (ENV_PATH, "app.json"),
        ])
        .unwrap();
        assert_eq!(config.credential.expose(), "ci-token");
    }

    #[test]
    fn env_rejects_malformed_values() {
        let mut env = base_env();
        env.push((ENV_REFRESH_SECS, "soon"));
        assert!(matches!(
            ClientConfig::from_env_iter(env),
            Err(ConfigError::InvalidConfig(_))
        ));

        let mut env = base_env();
        env.push((ENV_REFRESH_FAILURE, "panic"));
        assert!(matches!(
            ClientConfig::from_env_iter(env),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_reports_missing_fields() {
        let config = ClientConfig::new("", "acme", "settings", "app.json", Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing credential"));

        let config = ClientConfig::new("t", "acme", " ", "app.json", Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid configuration: missing repository");

        let config = ClientConfig::new("t", "acme", "settings", "app.json", Duration::ZERO)
            .with_api_base_url("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn credential_is_redacted_in_debug_output() {
        let config = ClientConfig::new("s3cr3t", "acme", "settings", "app.json", Duration::ZERO);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn location_display_includes_reference() {
        let location = FileLocation::new("acme", "settings", "app.json");
        assert_eq!(location.to_string(), "acme/settings/app.json");
        assert_eq!(
            location.with_reference("v2").to_string(),
            "acme/settings/app.json@v2"
        );
    }

    #[test]
    fn failure_policy_deserializes_from_snake_case() {
        let policy: RefreshFailurePolicy = serde_json::from_str("\"keep_last_good\"").unwrap();
        assert_eq!(policy, RefreshFailurePolicy::KeepLastGood);
        let policy: RefreshFailurePolicy = serde_json::from_str("\"stop\"").unwrap();
        assert_eq!(policy, RefreshFailurePolicy::Stop);
    }
}
