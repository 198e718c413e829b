use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, warn};

use crate::http::{HttpTransport, ProbeRequest, ProbeResponse};
use crate::models::RedirectHop;

use super::body;

pub const DEFAULT_MAX_HOPS: usize = 5;

/// Which client-side mechanism produced a body redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodySignal {
    MetaRefresh,
    Script,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyRedirect {
    pub signal: BodySignal,
    /// Target as written in the page.
    pub target: String,
    /// `target` resolved against the page URL.
    pub resolved: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub hops: Vec<RedirectHop>,
    pub terminal: Option<String>,
    /// Status of the first response.
    pub initial_status: Option<u16>,
    /// Status of the last response received.
    pub terminal_status: Option<u16>,
    /// Headers of the last redirecting response.
    pub evidence: Option<BTreeMap<String, String>>,
    /// A transport error cut the chain short.
    pub incomplete: bool,
    pub body_redirect: Option<BodyRedirect>,
}

/// Follows HTTP redirects hop by hop and falls back to meta/script signals
/// on 200 pages.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn HttpTransport>,
    max_hops: usize,
}

impl Resolver {
    pub fn new(transport: Arc<dyn HttpTransport>, max_hops: usize) -> Self {
        Self {
            transport,
            max_hops: max_hops.max(1),
        }
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    /// Resolve `request`. `accept` decides whether a body candidate counts;
    /// HTTP-level terminals are returned unjudged.
    pub async fn resolve<F>(&self, request: &ProbeRequest, accept: F) -> ResolutionOutcome
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        let mut outcome = ResolutionOutcome::default();
        let response = match self.transport.send(request).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = e.url(), error = %e, "request failed");
                outcome.incomplete = true;
                return outcome;
            }
        };
        outcome.initial_status = Some(response.status);
        outcome.terminal_status = Some(response.status);

        if response.is_redirect() {
            self.follow_chain(&request.url, response, &mut outcome).await;
        } else if response.status == 200 {
            outcome.body_redirect = self.inspect_body(&request.url, &response, &accept).await;
            outcome.terminal = outcome.body_redirect.as_ref().map(|b| b.resolved.clone());
        }
        outcome
    }

    /// Follow an already-received redirect response until a non-redirect,
    /// a missing `Location`, a transport failure or the hop bound.
    pub async fn follow_chain(&self, start_url: &str, first: ProbeResponse, outcome: &mut ResolutionOutcome) {
        let mut current_url = start_url.to_string();
        let mut current = first;

        loop {
            let Some(location) = current.location().map(str::to_string) else {
                // Evidence stays with the last hop that announced a location.
                if outcome.hops.is_empty() {
                    outcome.evidence = Some(current.headers.clone());
                }
                outcome.terminal = Some(current_url);
                return;
            };

            outcome.hops.push(RedirectHop {
                url: current_url.clone(),
                status: current.status,
                location: location.clone(),
            });
            outcome.evidence = Some(current.headers.clone());

            let resolved = match join_location(&current_url, &location) {
                Some(url) => url,
                None => {
                    debug!(from = %current_url, location = %location, "unresolvable location");
                    outcome.terminal = Some(location);
                    return;
                }
            };
            debug!(
                hop = outcome.hops.len(),
                max = self.max_hops,
                from = %current_url,
                to = %resolved,
                "following redirect"
            );

            if outcome.hops.len() >= self.max_hops {
                debug!(url = %start_url, terminal = %resolved, "max redirects reached");
                outcome.terminal = Some(resolved);
                return;
            }
            if !is_http_url(&resolved) {
                outcome.terminal = Some(resolved);
                return;
            }

            let next = match self.transport.send(&ProbeRequest::get(&resolved)).await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(url = e.url(), error = %e, "redirect chain interrupted");
                    outcome.incomplete = true;
                    outcome.terminal = Some(resolved);
                    return;
                }
            };
            outcome.terminal_status = Some(next.status);
            if !next.is_redirect() {
                outcome.terminal = Some(resolved);
                return;
            }
            current_url = resolved;
            current = next;
        }
    }

    /// Candidates are judged by the URL a browser would navigate to, not by
    /// the raw text in the page.
    async fn inspect_body<F>(&self, page_url: &str, page: &ProbeResponse, accept: &F) -> Option<BodyRedirect>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        if let Some(target) = body::meta_refresh_target(&page.body) {
            match join_location(page_url, &target) {
                Some(resolved) => {
                    if accept(resolved.as_str()) && self.verify_meta(&resolved).await {
                        return Some(BodyRedirect {
                            signal: BodySignal::MetaRefresh,
                            target,
                            resolved,
                        });
                    }
                }
                None => debug!(url = page_url, location = %target, "unresolvable meta refresh target"),
            }
        }

        for target in body::script_redirect_targets(&page.body) {
            let Some(resolved) = join_location(page_url, &target) else {
                continue;
            };
            if !accept(resolved.as_str()) {
                continue;
            }
            if Url::parse(&target).is_err() && is_http_url(&resolved) {
                self.confirm_script_target(&resolved).await;
            }
            return Some(BodyRedirect {
                signal: BodySignal::Script,
                target,
                resolved,
            });
        }
        None
    }

    async fn verify_meta(&self, url: &str) -> bool {
        if !is_http_url(url) {
            return true;
        }
        match self.transport.send(&ProbeRequest::get(url)).await {
            Ok(resp) if resp.status < 400 => true,
            Ok(resp) => {
                debug!(url, status = resp.status, "meta refresh target rejected");
                false
            }
            Err(e) => {
                debug!(url, error = %e, "meta refresh target unreachable");
                false
            }
        }
    }

    /// Best effort; the outcome is only logged.
    async fn confirm_script_target(&self, url: &str) {
        match self.transport.send(&ProbeRequest::get(url)).await {
            Ok(resp) if resp.status < 400 => {}
            Ok(resp) => debug!(url, status = resp.status, "script redirect target not confirmed"),
            Err(e) => debug!(url, error = %e, "script redirect target not confirmed"),
        }
    }
}

/// Resolve a `Location` value against the URL that produced it.
pub fn join_location(base: &str, location: &str) -> Option<String> {
    if let Ok(url) = Url::parse(location) {
        return Some(url.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(location).ok().map(|u| u.to_string())
}

fn is_http_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
