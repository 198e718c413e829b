//! In-process transport for tests: answers from a closure and records every
//! request it sees.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{HttpTransport, ProbeRequest, ProbeResponse, TransportError};

type Handler = dyn Fn(&ProbeRequest) -> Result<ProbeResponse, TransportError> + Send + Sync;

pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    seen: Mutex<Vec<ProbeRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&ProbeRequest) -> Result<ProbeResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ProbeRequest> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ProbeRequest) -> Result<ProbeResponse, TransportError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        (self.handler)(request)
    }

    fn requests_sent(&self) -> u64 {
        self.seen.lock().map(|v| v.len() as u64).unwrap_or(0)
    }
}

pub(crate) fn redirect(url: &str, status: u16, location: &str) -> Result<ProbeResponse, TransportError> {
    let mut headers = BTreeMap::new();
    headers.insert("location".to_string(), location.to_string());
    headers.insert("server".to_string(), "scripted".to_string());
    Ok(ProbeResponse {
        url: url.to_string(),
        status,
        headers,
        body: String::new(),
    })
}

pub(crate) fn page(url: &str, status: u16, body: &str) -> Result<ProbeResponse, TransportError> {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "text/html".to_string());
    Ok(ProbeResponse {
        url: url.to_string(),
        status,
        headers,
        body: body.to_string(),
    })
}

pub(crate) fn unreachable(url: &str) -> Result<ProbeResponse, TransportError> {
    Err(TransportError::Connection {
        url: url.to_string(),
        message: "connection refused".to_string(),
    })
}
