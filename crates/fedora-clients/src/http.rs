//! HTTP client for Copr pages, build logs and PDC
//!
//! Two server quirks are handled here rather than at the call sites:
//! - the log server occasionally drops the connection, sometimes halfway
//!   through a body; the whole fetch is retried exactly once after a short
//!   backoff
//! - some result directories only have the uncompressed log, so a 404 on a
//!   `.gz` URL is retried with the suffix stripped

use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Method, Response, StatusCode};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::traits::WebFetch;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Pause before the single retry after a disconnect
    pub retry_backoff: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(1),
            user_agent: format!("ftbfs-monitor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// reqwest-backed [`WebFetch`]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: HttpConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(HttpClient { client, config })
    }

    async fn send_once(&self, method: Method, url: &str) -> ClientResult<Response> {
        let response = self.client.request(method, url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// One request with its body read to the end.
    async fn fetch_once(&self, method: Method, url: &str) -> ClientResult<Fetched> {
        let response = self.send_once(method, url).await?;
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            debug!(url, error = %e, "body cut short");
            ClientError::Disconnected(url.to_string())
        })?;
        Ok(Fetched {
            headers,
            body: body.to_vec(),
        })
    }

    async fn fetch_with_retry(&self, method: Method, url: &str) -> ClientResult<Fetched> {
        match self.fetch_once(method.clone(), url).await {
            Err(e) if e.is_transient() => {
                debug!(url, error = %e, "retrying after disconnect");
                tokio::time::sleep(self.config.retry_backoff).await;
                self.fetch_once(method, url).await
            }
            other => other,
        }
    }

    async fn fetch(&self, method: Method, url: &str) -> ClientResult<Fetched> {
        match self.fetch_with_retry(method.clone(), url).await {
            Err(ClientError::NotFound(_)) if url.ends_with(".gz") => {
                let plain = strip_gz_suffix(url);
                debug!(url, fallback = plain, "compressed log missing");
                self.fetch_with_retry(method, plain).await
            }
            other => other,
        }
    }
}

struct Fetched {
    headers: HeaderMap,
    body: Vec<u8>,
}

#[async_trait]
impl WebFetch for HttpClient {
    async fn get_text(&self, url: &str) -> ClientResult<String> {
        debug!(url, "fetch");
        let fetched = self.fetch(Method::GET, url).await?;
        decode_body(url, &fetched.body)
    }

    async fn get_json(&self, url: &str) -> ClientResult<serde_json::Value> {
        let text = self.get_text(url).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn content_length(&self, url: &str) -> ClientResult<u64> {
        debug!(url, "length");
        let fetched = self.fetch(Method::HEAD, url).await?;
        // Response::content_length() reflects the (empty) HEAD body, not the header
        fetched
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ClientError::MissingLength(url.to_string()))
    }
}

fn strip_gz_suffix(url: &str) -> &str {
    url.strip_suffix(".gz").unwrap_or(url)
}

/// Decode a response body, transparently inflating gzip content.
pub fn decode_body(url: &str, body: &[u8]) -> ClientResult<String> {
    if body.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(body)
            .read_to_end(&mut inflated)
            .map_err(|e| ClientError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&inflated).into_owned())
    } else {
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}
