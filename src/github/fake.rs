//! In-memory `Fetcher` for handler and server tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{FetchError, Fetcher};

pub const FAKE_API_BASE: &str = "https://api.github.test";

/// Answers each URL with a canned outcome; unknown URLs are 404s.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Result<Value, FetchError>>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, outcome: Result<Value, FetchError>) -> Self {
        self.responses.insert(url.into(), outcome);
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    fn api_base(&self) -> &str {
        FAKE_API_BASE
    }

    async fn get(&self, url: &str) -> Result<Value, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::NotFound))
    }
}
