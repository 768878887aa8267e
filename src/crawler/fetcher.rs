//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Gate-filtered name resolution inside the client
//! - Manual redirect handling with loop detection and a hop limit
//! - Safety-gate checks on the original URL and every redirect target
//! - Politeness pacing of every request, redirect hops included
//! - Size-capped body reads
//! - Status-only probes for broken-link detection
//! - Error classification

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::url::{SafetyError, SafetyGate};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{header, redirect::Policy, Client, Method, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Largest response body read into memory; the rest is discarded
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Per-URL fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("blocked {url}: {source}")]
    Unsafe {
        url: String,
        #[source]
        source: SafetyError,
    },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect loop detected at {url}")]
    RedirectLoop { url: String },

    #[error("Redirect from {url} has no usable Location header")]
    MissingLocation { url: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// True when the safety gate refused the request
    pub fn is_safety_violation(&self) -> bool {
        matches!(self, Self::Unsafe { .. })
    }
}

/// A completed request after following redirects
#[derive(Debug)]
pub struct FetchedResponse {
    /// Every URL requested, original first, final last
    pub chain: Vec<Url>,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl FetchedResponse {
    pub fn final_url(&self) -> &Url {
        // chain always holds at least the original URL
        &self.chain[self.chain.len() - 1]
    }

    pub fn hops(&self) -> usize {
        self.chain.len() - 1
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        let ct = self.content_type.to_ascii_lowercase();
        ct.contains("text/html") || ct.contains("application/xhtml")
    }
}

/// Resolver that only hands the gate's allowed addresses to the connector
#[derive(Debug)]
struct GatedResolver {
    gate: SafetyGate,
}

impl Resolve for GatedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let gate = self.gate.clone();
        Box::pin(async move {
            let addrs = gate.resolve(name.as_str()).await?;
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(Box::new(addrs.into_iter()))
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Automatic redirects are disabled: every hop must pass the safety gate,
/// so [`Fetcher`] follows them itself. Host names resolve through `gate`.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
    gate: &SafetyGate,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::none())
        .dns_resolver(Arc::new(GatedResolver { gate: gate.clone() }))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Minimum spacing between consecutive requests
#[derive(Debug, Default)]
struct Pacer {
    delay_ms: AtomicU64,
    last_request: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay_ms: AtomicU64::new(delay.as_millis() as u64),
            last_request: Mutex::new(None),
        }
    }

    /// Waits until the delay since the previous request has passed
    async fn wait(&self) {
        // Held across the sleep so concurrent callers queue up
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let delay = Duration::from_millis(self.delay_ms.load(Ordering::Relaxed));
            tokio::time::sleep_until(previous + delay).await;
        }
        *last = Some(Instant::now());
    }
}

/// Gate-checked HTTP fetcher shared by every request of a crawl
///
/// Clones share one pacer; [`Fetcher::paced`] starts a new one.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    gate: SafetyGate,
    max_redirects: u32,
    max_body_bytes: usize,
    pacer: Arc<Pacer>,
}

impl Fetcher {
    /// Creates an unpaced fetcher
    ///
    /// `client` should come from [`build_http_client`] with the same gate.
    pub fn new(client: Client, gate: SafetyGate, max_redirects: u32) -> Self {
        Self {
            client,
            gate,
            max_redirects,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            pacer: Arc::new(Pacer::default()),
        }
    }

    /// Builds a fetcher from crawler and user agent configuration
    pub fn from_config(
        config: &CrawlerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let gate = SafetyGate::with_trusted_hosts(config.trusted_hosts.clone());
        let client = build_http_client(user_agent, config.request_timeout(), &gate)?;
        Ok(Self::new(client, gate, config.max_redirects).paced(config.politeness_delay()))
    }

    /// Returns a fetcher on the same client with its own pacing state
    pub fn paced(&self, delay: Duration) -> Self {
        Self {
            pacer: Arc::new(Pacer::new(delay)),
            ..self.clone()
        }
    }

    /// Changes the spacing for every clone sharing this fetcher's pacer
    pub fn set_delay(&self, delay: Duration) {
        self.pacer
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.pacer.delay_ms.load(Ordering::Relaxed))
    }

    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn gate(&self) -> &SafetyGate {
        &self.gate
    }

    /// Fetches a URL with GET, following redirects manually
    ///
    /// # Request Flow
    ///
    /// 1. Check the URL against the safety gate
    /// 2. Wait out the politeness delay and send the request
    /// 3. On 301/302/303/307/308, resolve `Location`, detect loops, enforce the
    ///    hop limit and go back to 1 with the new target
    /// 4. Read the body of the final response, up to the byte limit
    ///
    /// There is no retry: a failed fetch is reported and the crawl moves on.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedResponse, FetchError> {
        let (response, chain) = self.follow(Method::GET, url).await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = self.read_body(url, response).await?;

        Ok(FetchedResponse {
            chain,
            status,
            content_type,
            body,
        })
    }

    /// Returns the final status of a URL without reading a body
    ///
    /// Uses HEAD, falling back to GET for servers that refuse HEAD.
    pub async fn probe_status(&self, url: &Url) -> Result<u16, FetchError> {
        let (response, _) = self.follow(Method::HEAD, url).await?;
        let status = response.status();

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            let (response, _) = self.follow(Method::GET, url).await?;
            return Ok(response.status().as_u16());
        }

        Ok(status.as_u16())
    }

    /// Fetches a text resource (robots.txt, sitemaps)
    ///
    /// Returns `Ok(None)` for non-success statuses.
    pub async fn fetch_text(&self, url: &Url) -> Result<Option<String>, FetchError> {
        let response = self.fetch(url).await?;
        if response.is_success() {
            Ok(Some(response.body))
        } else {
            Ok(None)
        }
    }

    async fn follow(&self, method: Method, url: &Url) -> Result<(Response, Vec<Url>), FetchError> {
        let mut chain = vec![url.clone()];
        let mut current = url.clone();

        loop {
            self.gate
                .check_url(&current)
                .map_err(|source| FetchError::Unsafe {
                    url: current.to_string(),
                    source,
                })?;

            self.pacer.wait().await;
            tracing::trace!("{} {}", method, current);
            let response = self
                .client
                .request(method.clone(), current.clone())
                .send()
                .await
                .map_err(|e| classify_error(&current, e))?;

            if !is_followed_redirect(response.status()) {
                return Ok((response, chain));
            }

            let mut next = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| current.join(location.trim()).ok())
                .ok_or_else(|| FetchError::MissingLocation {
                    url: current.to_string(),
                })?;
            next.set_fragment(None);

            if chain.contains(&next) {
                return Err(FetchError::RedirectLoop {
                    url: next.to_string(),
                });
            }

            if chain.len() > self.max_redirects as usize {
                return Err(FetchError::RedirectLimit {
                    url: url.to_string(),
                });
            }

            chain.push(next.clone());
            current = next;
        }
    }

    async fn read_body(&self, url: &Url, mut response: Response) -> Result<String, FetchError> {
        let mut body: Vec<u8> = Vec::new();

        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })? {
            let room = self.max_body_bytes - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                tracing::debug!("Body of {} truncated at {} bytes", url, self.max_body_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn classify_error(url: &Url, e: reqwest::Error) -> FetchError {
    if let Some(source) = safety_cause(&e) {
        FetchError::Unsafe {
            url: url.to_string(),
            source,
        }
    } else if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// Finds a resolver refusal in the error's source chain
fn safety_cause(e: &reqwest::Error) -> Option<SafetyError> {
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(safety) = err.downcast_ref::<SafetyError>() {
            return Some(safety.clone());
        }
        source = err.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestAudit".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(
            &create_test_config(),
            Duration::from_secs(5),
            &SafetyGate::strict(),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_followed_redirect_statuses() {
        assert!(is_followed_redirect(StatusCode::MOVED_PERMANENTLY));
        assert!(is_followed_redirect(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_followed_redirect(StatusCode::NOT_MODIFIED));
        assert!(!is_followed_redirect(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_private_target_blocked_before_request() {
        let gate = SafetyGate::strict();
        let fetcher = Fetcher::new(
            build_http_client(&create_test_config(), Duration::from_secs(1), &gate).unwrap(),
            gate,
            10,
        );

        for target in [
            "http://127.0.0.1/",
            "http://169.254.169.254/latest/meta-data/",
            "http://10.0.0.5/",
            "http://192.168.1.1/",
            "http://172.16.0.1/",
            "http://localhost:8080/",
        ] {
            let err = fetcher.fetch(&Url::parse(target).unwrap()).await.unwrap_err();
            assert!(err.is_safety_violation(), "{} was not blocked", target);
        }
    }

    #[tokio::test]
    async fn test_pacer_spaces_requests() {
        let pacer = Pacer::new(Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..3 {
            pacer.wait().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_paced_clone_has_its_own_delay() {
        let gate = SafetyGate::strict();
        let base = Fetcher::new(
            build_http_client(&create_test_config(), Duration::from_secs(1), &gate).unwrap(),
            gate,
            10,
        );
        let paced = base.paced(Duration::from_millis(200));
        let shared = paced.clone();
        shared.set_delay(Duration::from_millis(500));

        assert_eq!(base.delay(), Duration::ZERO);
        assert_eq!(paced.delay(), Duration::from_millis(500));
    }
}
