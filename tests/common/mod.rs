//! Shared helpers for pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use linkparse::http_client::{HttpClient, HttpRequest, HttpResponse};
use linkparse::{ParseError, ParseResult, Renderer};
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use tokio::sync::Barrier;

/// In-memory origin: fixed responses per URL, records every request.
#[derive(Default)]
pub struct FakeOrigin {
    routes: HashMap<String, (u16, HeaderMap, String)>,
    requests: Mutex<Vec<String>>,
    gate: Option<Arc<Barrier>>,
}

impl FakeOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes
            .insert(url.to_string(), (status, HeaderMap::new(), body.to_string()));
        self
    }

    pub fn redirect(mut self, url: &str, location: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_str(location).unwrap());
        self.routes
            .insert(url.to_string(), (302, headers, String::new()));
        self
    }

    /// Every request waits until `parties` requests are in flight.
    pub fn gated(mut self, parties: usize) -> Self {
        self.gate = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeOrigin {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ParseError> {
        self.requests.lock().unwrap().push(request.url.clone());
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        let (status, headers, body) = self
            .routes
            .get(&request.url)
            .cloned()
            .ok_or_else(|| ParseError::Timeout(request.url.clone()))?;
        Ok(HttpResponse {
            status,
            headers,
            body,
            url: request.url,
        })
    }
}

/// Renderer that counts calls and can be told to fail.
#[derive(Default)]
pub struct RecordingRenderer {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl RecordingRenderer {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn render(&self, _result: &ParseResult) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("send failed");
        }
        Ok(())
    }
}

pub fn xhs_page(state: &str) -> String {
    format!("<html><script>window.__INITIAL_STATE__={state}</script></html>")
}

pub const XHS_EXPLORE_STATE: &str = r#"{"note":{"noteDetailMap":{"abc":{"note":{
    "type":"normal","title":"Weekend bakery","desc":"croissants",
    "user":{"nickname":"baker","avatar":"https://img/baker.jpg"},
    "imageList":[{"urlDefault":"https://img/1.jpg"},{"urlDefault":"https://img/2.jpg"}],
    "video":undefined}}}}}"#;

pub fn tweet_body(id: &str, text: &str) -> String {
    format!(
        r#"{{"code":200,"message":"OK","tweet":{{"url":"https://x.com/u/status/{id}","text":"{text}","author":{{"name":"U"}},"created_timestamp":1700000000}}}}"#
    )
}
