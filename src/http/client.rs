use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, trace};

use super::{HttpTransport, ProbeMethod, ProbeRequest, ProbeResponse, TransportError};

const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    /// Fixed user agent; rotates through browser agents when unset.
    pub user_agent: Option<String>,
    /// Extra header added to every request, `Key: Value`.
    pub header: Option<String>,
    /// Requests per second, 0 disables the limiter.
    pub rate: u32,
    pub delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            proxy: None,
            user_agent: None,
            header: None,
            rate: 0,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("failed to setup proxy: {proxy}: {source}")]
    Proxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid header '{header}', expected 'Key: Value'")]
    Header { header: String },

    #[error("failed to build HTTP client: {source}")]
    Build {
        #[source]
        source: reqwest::Error,
    },
}

/// reqwest-backed transport shared read-only by every worker.
pub struct HttpClient {
    client: reqwest::Client,
    user_agent: Option<String>,
    extra_header: Option<(HeaderName, HeaderValue)>,
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    delay: Duration,
    requests: AtomicU64,
    ua_index: AtomicUsize,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientBuildError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let timeout = Duration::from_secs(config.timeout_seconds.max(1));
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .danger_accept_invalid_hostnames(true)
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| ClientBuildError::Proxy {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let extra_header = match config.header.as_deref().filter(|h| !h.trim().is_empty()) {
            Some(raw) => Some(parse_header_line(raw).ok_or_else(|| ClientBuildError::Header {
                header: raw.to_string(),
            })?),
            None => None,
        };

        let limiter = NonZeroU32::new(config.rate).map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        let client = builder
            .build()
            .map_err(|e| ClientBuildError::Build { source: e })?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone().filter(|ua| !ua.trim().is_empty()),
            extra_header,
            limiter,
            delay: config.delay,
            requests: AtomicU64::new(0),
            ua_index: AtomicUsize::new(0),
        })
    }

    pub fn into_shared(self) -> Arc<dyn HttpTransport> {
        Arc::new(self)
    }

    fn next_user_agent(&self) -> &str {
        match self.user_agent.as_deref() {
            Some(ua) => ua,
            None => {
                let idx = self.ua_index.fetch_add(1, Ordering::Relaxed) % BROWSER_USER_AGENTS.len();
                BROWSER_USER_AGENTS[idx]
            }
        }
    }

    fn build(&self, request: &ProbeRequest) -> Result<reqwest::Request, TransportError> {
        let build_err = |message: String| TransportError::Build {
            url: request.url.clone(),
            message,
        };
        let url = reqwest::Url::parse(&request.url).map_err(|e| build_err(e.to_string()))?;
        let method = match request.method {
            ProbeMethod::Get => reqwest::Method::GET,
            ProbeMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::USER_AGENT, self.next_user_agent());
        if let Some((key, value)) = self.extra_header.as_ref() {
            builder = builder.header(key.clone(), value.clone());
        }
        for (k, v) in request.headers.iter() {
            let key = HeaderName::from_str(k.trim()).map_err(|e| build_err(e.to_string()))?;
            let value = HeaderValue::from_str(v).map_err(|e| build_err(e.to_string()))?;
            builder = builder.header(key, value);
        }
        if let Some(cookie) = request.cookie_header() {
            let value = HeaderValue::from_str(&cookie).map_err(|e| build_err(e.to_string()))?;
            builder = builder.header(reqwest::header::COOKIE, value);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        builder.build().map_err(|e| build_err(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(limiter) = self.limiter.as_ref() {
            limiter.until_ready().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let req = self.build(request)?;
        trace!(method = request.method.as_str(), url = %request.url, "sending request");
        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        let url = resp.url().to_string();
        let status = resp.status().as_u16();
        let headers = super::header_map_to_btree(resp.headers());
        let body = read_capped_body(&request.url, resp).await;
        Ok(ProbeResponse {
            url,
            status,
            headers,
            body,
        })
    }

    fn requests_sent(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Body text, reading at most `MAX_BODY_BYTES` off the wire.
async fn read_capped_body(url: &str, mut resp: reqwest::Response) -> String {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                buf.extend_from_slice(&chunk);
                if buf.len() >= MAX_BODY_BYTES {
                    trace!(url, "response body truncated");
                    buf.truncate(MAX_BODY_BYTES);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(url, error = %e, "failed to read response body");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn classify_error(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_connect() {
        TransportError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else if e.is_builder() {
        TransportError::Build {
            url: url.to_string(),
            message: e.to_string(),
        }
    } else {
        TransportError::Other {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

pub(crate) fn parse_header_line(raw: &str) -> Option<(HeaderName, HeaderValue)> {
    let (key, value) = raw.split_once(':')?;
    let key = HeaderName::from_str(key.trim()).ok()?;
    let value = HeaderValue::from_str(value.trim()).ok()?;
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line_requires_colon() {
        assert!(parse_header_line("X-Test: yes").is_some());
        assert!(parse_header_line("X-Test yes").is_none());
        assert!(parse_header_line("Bad Name: yes").is_none());
    }

    #[test]
    fn invalid_extra_header_is_rejected() {
        let config = ClientConfig {
            header: Some("nonsense".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            HttpClient::new(&config),
            Err(ClientBuildError::Header { .. })
        ));
    }

    #[test]
    fn user_agent_rotates_unless_fixed() {
        let client = HttpClient::new(&ClientConfig::default()).unwrap();
        let first = client.next_user_agent().to_string();
        let second = client.next_user_agent().to_string();
        assert_ne!(first, second);

        let fixed = HttpClient::new(&ClientConfig {
            user_agent: Some("redirx-test".to_string()),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(fixed.next_user_agent(), "redirx-test");
        assert_eq!(fixed.next_user_agent(), "redirx-test");
    }

    #[tokio::test]
    async fn invalid_header_value_is_a_build_error_and_counted() {
        let client = HttpClient::new(&ClientConfig::default()).unwrap();
        let req = ProbeRequest::get("http://127.0.0.1:9/").with_header("X-Bad", "line\nbreak");
        let err = client.send(&req).await.unwrap_err();
        assert!(matches!(err, TransportError::Build { .. }));
        assert_eq!(client.requests_sent(), 1);
    }

    #[tokio::test]
    async fn rate_limit_spaces_requests() {
        let client = HttpClient::new(&ClientConfig {
            rate: 1,
            ..ClientConfig::default()
        })
        .unwrap();
        assert!(client.limiter.is_some());
        let req = ProbeRequest::get("http://127.0.0.1:9/").with_header("X-Bad", "line\nbreak");

        let started = std::time::Instant::now();
        let _ = client.send(&req).await;
        let _ = client.send(&req).await;
        assert!(started.elapsed() >= Duration::from_millis(900));
        assert_eq!(client.requests_sent(), 2);
    }

    #[test]
    fn zero_rate_disables_limiter() {
        let client = HttpClient::new(&ClientConfig::default()).unwrap();
        assert!(client.limiter.is_none());
    }
}
