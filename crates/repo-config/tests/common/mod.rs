//! Helpers shared by the integration tests.

use base64::Engine;
use mockito::{Mock, ServerGuard};
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";
pub const OWNER: &str = "acme";
pub const REPO: &str = "settings";
pub const FILE_PATH: &str = "services/api.json";

pub fn contents_path() -> String {
    format!("/repos/{OWNER}/{REPO}/contents/{FILE_PATH}")
}

/// Renders a contents API body the way GitHub does: base64 wrapped at 60 columns.
pub fn contents_body(document: &Value, sha: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(document.to_string());
    let wrapped = encoded
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    json!({
        "type": "file",
        "encoding": "base64",
        "name": "api.json",
        "path": FILE_PATH,
        "sha": sha,
        "content": format!("{wrapped}\n"),
    })
    .to_string()
}

/// Registers a contents mock answering with `document` on the default branch.
pub async fn mock_document(server: &mut ServerGuard, document: &Value, sha: &str) -> Mock {
    server
        .mock("GET", contents_path().as_str())
        .match_header("authorization", format!("Bearer {TOKEN}").as_str())
        .match_header("accept", "application/vnd.github+json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(contents_body(document, sha))
        .create_async()
        .await
}
