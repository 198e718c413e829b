pub mod client;
#[cfg(test)]
pub(crate) mod scripted;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{ClientConfig, HttpClient};

/// Status codes treated as HTTP-level redirects.
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

pub fn is_redirect_status(status: u16) -> bool {
    REDIRECT_STATUSES.contains(&status)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMethod {
    Get,
    Post,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Get => "GET",
            ProbeMethod::Post => "POST",
        }
    }
}

/// A single request issued by the core. Redirects are never followed by the
/// transport; the resolver sees every hop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub method: ProbeMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl ProbeRequest {
    pub fn get(url: &str) -> Self {
        Self {
            method: ProbeMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post_form(url: &str, form: Vec<(String, String)>) -> Self {
        Self {
            method: ProbeMethod::Post,
            url: url.to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
            form,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    /// `Cookie` header value for the request cookies, if any.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    pub url: String,
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProbeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Non-empty `Location` header value.
    pub fn location(&self) -> Option<&str> {
        self.header("location")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("connection failed: {url}: {message}")]
    Connection { url: String, message: String },

    #[error("invalid request for {url}: {message}")]
    Build { url: String, message: String },

    #[error("request failed: {url}: {message}")]
    Other { url: String, message: String },
}

impl TransportError {
    pub fn url(&self) -> &str {
        match self {
            TransportError::Timeout { url }
            | TransportError::Connection { url, .. }
            | TransportError::Build { url, .. }
            | TransportError::Other { url, .. } => url,
        }
    }
}

/// The HTTP client contract the scanning core depends on.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError>;

    /// Total requests attempted through this transport.
    fn requests_sent(&self) -> u64;
}

pub(crate) fn header_map_to_btree(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (k, v) in headers.iter() {
        if let Ok(v) = v.to_str() {
            out.insert(k.as_str().to_lowercase(), v.to_string());
        }
    }
    out
}
