//! GitHub "repository contents" client.
//!
//! Reads a single file through `GET /repos/{owner}/{repo}/contents/{path}`.
//! The response carries the file as base64 text plus its blob SHA; decoding
//! is left to [`RemoteContent::decode`] so every source shares the same rules.
//! When no reference is configured the `ref` query parameter is omitted and
//! GitHub resolves the repository default branch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::{ClientConfig, Credential, FileLocation};
use crate::error::ConfigError;
use crate::source::{ContentEncoding, ContentSource, RemoteContent};

/// REST API version pinned on every request.
const API_VERSION: &str = "2022-11-28";
const API_VERSION_HEADER: &str = "x-github-api-version";
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Failures talking to the contents endpoint.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The token was rejected.
    #[error("unauthorized - invalid or expired access token")]
    Unauthorized,
    /// The token lacks access to the repository, or the rate limit is exhausted.
    #[error("forbidden - token lacks repository access or rate limit exceeded")]
    Forbidden,
    /// Repository, file, or reference does not exist (or is hidden from the token).
    #[error("not found - repository, file, or reference does not exist")]
    NotFound,
    #[error("unexpected redirect: status {0}")]
    Redirect(u16),
    /// Any other 4xx response.
    #[error("request rejected: status {0}")]
    Client(u16),
    #[error("server error: status {0}")]
    Server(u16),
    /// The provided URL violates the required transport policy.
    #[error("insecure base url requires explicit opt-in: {0}")]
    InsecureUrl(String),
    /// The API base URL cannot be parsed or cannot carry a path.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    /// Transport-level issue (DNS, TLS, socket, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response was not the description of a single file.
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
    /// The credential cannot be carried in an HTTP header.
    #[error("credential contains characters not allowed in an HTTP header")]
    InvalidCredential,
}

/// Subset of the contents API response used by the client.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

/// Content source backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: Client,
    base_url: Url,
    headers: HeaderMap,
}

impl GithubSource {
    /// Builds a source authenticated with `credential`.
    ///
    /// `http://` base URLs are refused unless `allow_plaintext` is set.
    pub fn new(
        base_url: &str,
        credential: &Credential,
        request_timeout: Option<Duration>,
        allow_plaintext: bool,
    ) -> Result<Self, HttpError> {
        let raw = base_url;
        let base_url =
            Url::parse(raw).map_err(|err| HttpError::InvalidBaseUrl(format!("{raw}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(HttpError::InvalidBaseUrl(raw.to_string()));
        }
        // The parsed scheme is lowercased, so mixed-case inputs are caught too.
        if !allow_plaintext && base_url.scheme() == "http" {
            return Err(HttpError::InsecureUrl(raw.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repo-config/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| HttpError::InvalidCredential)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url,
            headers,
        })
    }

    /// Builds a source from the transport settings of a [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            &config.api_base_url,
            &config.credential,
            config.request_timeout,
            config.allow_plaintext,
        )?)
    }

    /// Normalised API base URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Resolves the contents endpoint URL for `location`, percent-encoding each segment.
    fn contents_url(&self, location: &FileLocation) -> Result<Url, HttpError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| HttpError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend([
                    "repos",
                    location.owner.as_str(),
                    location.repo.as_str(),
                    "contents",
                ])
                .extend(location.path.split('/').filter(|part| !part.is_empty()));
        }
        url.set_query(None);
        if let Some(reference) = &location.reference {
            url.query_pairs_mut().append_pair("ref", reference);
        }
        Ok(url)
    }

    /// Fetches the contents description of one file.
    pub async fn fetch_contents(&self, location: &FileLocation) -> Result<RemoteContent, HttpError> {
        let url = self.contents_url(location)?;
        debug!(
            url = %url,
            headers = ?redact_headers(&self.headers),
            "repo-config HTTP request"
        );

        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            // Buffer the body so the backend message shows up in debug logs.
            let body = response.bytes().await.unwrap_or_default();
            debug!(
                url = %url,
                status = %status,
                body = %truncate_preview_text(&String::from_utf8_lossy(&body)),
                "repo-config HTTP response"
            );
            return Err(classify_status(status));
        }
        debug!(url = %url, status = %status, "repo-config HTTP response");

        let bytes = response.bytes().await?;
        let payload: ContentsResponse = serde_json::from_slice(&bytes).map_err(|err| {
            // Directories come back as a JSON array, which lands here.
            HttpError::UnexpectedPayload(format!("not a file description: {err}"))
        })?;
        into_remote_content(payload)
    }
}

#[async_trait]
impl ContentSource for GithubSource {
    async fn fetch(&self, location: &FileLocation) -> Result<RemoteContent, ConfigError> {
        Ok(self.fetch_contents(location).await?)
    }
}

fn into_remote_content(payload: ContentsResponse) -> Result<RemoteContent, HttpError> {
    if payload.kind != "file" {
        return Err(HttpError::UnexpectedPayload(format!(
            "expected a file, found {}",
            payload.kind
        )));
    }
    let encoding = match payload.encoding.as_deref() {
        Some(label) => ContentEncoding::from_label(label)
            .map_err(|_| HttpError::UnexpectedPayload(format!("unsupported encoding {label:?}")))?,
        None => ContentEncoding::None,
    };
    // Files over 1 MB are listed with no content, or with `"encoding": "none"`
    // and an empty string.
    let content = match payload.content {
        Some(content) if !(encoding == ContentEncoding::None && content.is_empty()) => content,
        _ => {
            return Err(HttpError::UnexpectedPayload(
                "file content not included in response".into(),
            ))
        }
    };
    Ok(RemoteContent {
        content,
        encoding,
        sha: payload.sha,
    })
}

/// Maps HTTP status codes to [`HttpError`].
pub(crate) fn classify_status(status: StatusCode) -> HttpError {
    match status {
        StatusCode::UNAUTHORIZED => HttpError::Unauthorized,
        StatusCode::FORBIDDEN => HttpError::Forbidden,
        StatusCode::NOT_FOUND => HttpError::NotFound,
        s if s.is_redirection() => HttpError::Redirect(s.as_u16()),
        s if s.is_server_error() => HttpError::Server(s.as_u16()),
        s => HttpError::Client(s.as_u16()),
    }
}

/// Returns a redacted view of request headers suitable for debug logging.
fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let display = if *name == AUTHORIZATION || value.is_sensitive() {
                "<redacted>".to_string()
            } else {
                value
                    .to_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| "<non-utf8>".to_string())
            };
            (name.as_str().to_string(), display)
        })
        .collect()
}

fn truncate_preview_text(text: &str) -> String {
    const MAX_CHARS: usize = 512;
    let mut chars = text.chars();
    let mut preview: String = chars.by_ref().take(MAX_CHARS).collect();
    if chars.next().is_some() {
        preview.push('…');
    }
    preview
}
