//! Canned-response [`HttpClient`] for unit tests.

use super::HttpClient;
use async_trait::async_trait;
use std::sync::Mutex;

pub(crate) struct StubClient {
    routes: Vec<(String, u16, Vec<u8>)>,
    requested: Mutex<Vec<String>>,
}

impl StubClient {
    pub(crate) fn new() -> Self {
        Self {
            routes: Vec::new(),
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Answers any URL containing `needle` with `status` and `body`. The
    /// first matching route wins; unmatched URLs get a 404.
    pub(crate) fn route(mut self, needle: &str, status: u16, body: Vec<u8>) -> Self {
        self.routes.push((needle.to_string(), status, body));
        self
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for StubClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let url = req.url().to_string();
        self.requested.lock().unwrap().push(url.clone());

        let (status, body) = self
            .routes
            .iter()
            .find(|(needle, _, _)| url.contains(needle.as_str()))
            .map(|(_, status, body)| (*status, body.clone()))
            .unwrap_or((404, Vec::new()));

        let resp = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap();
        Ok(reqwest::Response::from(resp))
    }
}
