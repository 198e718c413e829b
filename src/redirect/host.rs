use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::Url;
use thiserror::Error;

/// Lowercase host, suffixed with `:port` only when the port is not the
/// scheme default.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedHost(String);

impl NormalizedHost {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostParseError {
    #[error("empty input")]
    Empty,

    #[error("not a URL: {input}")]
    Unparsable { input: String },

    #[error("no host in {input}")]
    NoHost { input: String },
}

fn bare_authority() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9._-]+)(:\d{1,5})?$").ok())
        .as_ref()
}

/// Canonical host key of `s`, or `None` when no host can be extracted.
pub fn normalize(s: &str) -> Option<NormalizedHost> {
    parse_host(s).ok()
}

pub fn parse_host(s: &str) -> Result<NormalizedHost, HostParseError> {
    let input = s.trim();
    if input.is_empty() {
        return Err(HostParseError::Empty);
    }

    // `host` or `host:port` with no scheme. Parsed under a non-special scheme
    // so an explicit port survives as written.
    if bare_authority().map_or(false, |re| re.is_match(input)) {
        let url = Url::parse(&format!("host://{input}")).map_err(|_| HostParseError::Unparsable {
            input: input.to_string(),
        })?;
        return from_url(&url, input);
    }

    let candidate = if input.starts_with("//") {
        format!("http:{input}")
    } else {
        input.to_string()
    };
    let url = Url::parse(&candidate).map_err(|_| HostParseError::Unparsable {
        input: input.to_string(),
    })?;
    from_url(&url, input)
}

fn from_url(url: &Url, input: &str) -> Result<NormalizedHost, HostParseError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| HostParseError::NoHost {
            input: input.to_string(),
        })?
        .to_ascii_lowercase();

    let port = match (url.scheme(), url.port()) {
        ("http", Some(80)) | ("https", Some(443)) => None,
        (_, port) => port,
    };
    Ok(match port {
        Some(port) => NormalizedHost(format!("{host}:{port}")),
        None => NormalizedHost(host),
    })
}

/// True for `javascript:`, `data:` and `vbscript:` URIs.
pub fn is_script_uri(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    ["javascript:", "data:", "vbscript:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
