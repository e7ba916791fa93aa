// src/ingest/transport.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Desktop browser UA; several upstream hosts reject blank or library agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const FEED_ACCEPT: &str = "application/rss+xml, application/xml, text/xml, */*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raw GET of a feed URL. Non-2xx statuses are returned, not raised.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse>;
}

/// reqwest-backed transport with an in-memory revalidation window:
/// a successful body is served from memory until the window elapses.
pub struct HttpTransport {
    client: reqwest::Client,
    cache_window: Duration,
    cache: Mutex<HashMap<String, (Instant, String)>>,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration, cache_window: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            cache_window,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, url: &str) -> Option<String> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .get(url)
            .filter(|(at, _)| at.elapsed() < self.cache_window)
            .map(|(_, body)| body.clone())
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        if let Some(body) = self.cached(url) {
            debug!(target: "ingest", url, "serving feed from revalidation window");
            return Ok(FetchResponse { status: 200, body });
        }

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, FEED_ACCEPT)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;

        if (200..300).contains(&status) && !self.cache_window.is_zero() {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            cache.insert(url.to_string(), (Instant::now(), body.clone()));
        }
        Ok(FetchResponse { status, body })
    }
}

/// In-memory transport for tests and offline runs: URL → (status, body).
/// Unknown URLs answer 404; an optional delay simulates a slow upstream.
#[derive(Default)]
pub struct StaticTransport {
    routes: HashMap<String, FetchResponse>,
    unreachable: Vec<String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            url.to_string(),
            FetchResponse {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    /// Requests to `url` fail as if the host could not be reached.
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.push(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl FeedTransport for StaticTransport {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.unreachable.iter().any(|u| u == url) {
            anyhow::bail!("connection refused: {url}");
        }
        Ok(self.routes.get(url).cloned().unwrap_or(FetchResponse {
            status: 404,
            body: String::new(),
        }))
    }
}
