//! In-memory content source used by unit tests.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::FileLocation;
use crate::error::ConfigError;
use crate::github::classify_status;
use crate::source::{ContentEncoding, ContentSource, RemoteContent};

pub(crate) fn sample_location() -> FileLocation {
    FileLocation::new("acme", "settings", "services/api.json")
}

/// One scripted answer of [`ScriptedSource`].
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Content(RemoteContent),
    Status(u16),
}

impl Step {
    /// Serves `document` unencoded.
    pub(crate) fn json(document: Value) -> Self {
        Self::Content(RemoteContent::plain(document.to_string()))
    }

    /// Serves `document` base64-encoded, the way GitHub does, with a fixed SHA.
    pub(crate) fn base64(document: Value) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(document.to_string());
        Self::Content(RemoteContent {
            content: encoded,
            encoding: ContentEncoding::Base64,
            sha: Some("sha-2".into()),
        })
    }

    pub(crate) fn raw(text: &str) -> Self {
        Self::Content(RemoteContent::plain(text))
    }

    pub(crate) fn corrupt_base64() -> Self {
        Self::Content(RemoteContent {
            content: "%%%".into(),
            encoding: ContentEncoding::Base64,
            sha: None,
        })
    }

    /// Fails the fetch the way the GitHub source would for this HTTP status.
    pub(crate) fn status(code: u16) -> Self {
        Self::Status(code)
    }
}

/// Source replaying a list of steps; the last step repeats once the list runs out.
#[derive(Debug)]
pub(crate) struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Appends a step to the script.
    pub(crate) fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let next = self.steps.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last
                .clone()
                .expect("scripted source needs at least one step"),
        }
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch(&self, location: &FileLocation) -> Result<RemoteContent, ConfigError> {
        assert_eq!(location, &sample_location());
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Content(content) => Ok(content),
            Step::Status(code) => {
                let status = StatusCode::from_u16(code).expect("valid status code");
                Err(ConfigError::Http(classify_status(status)))
            }
        }
    }
}
