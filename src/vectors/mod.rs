//! Injection strategies. Each tester places payloads at one kind of
//! injection point and hands every response to the shared resolver.

pub mod cookies;
pub mod forms;
pub mod headers;
pub mod params;

use std::ops::ControlFlow;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::http::ProbeRequest;
use crate::models::{Finding, InjectionPoint, RedirectMethod};
use crate::payloads::PayloadSet;
use crate::redirect::severity;
use crate::redirect::validator::is_valid_exploit;
use crate::redirect::{BodySignal, Resolver};
use crate::scanner::ScanConfig;

pub use cookies::CookieTester;
pub use forms::FormTester;
pub use headers::HeaderTester;
pub use params::ParamTester;

/// Everything a tester needs for one target.
pub struct ScanContext<'a> {
    pub target: &'a str,
    pub resolver: &'a Resolver,
    pub config: &'a ScanConfig,
    pub payloads: &'a PayloadSet,
}

impl<'a> ScanContext<'a> {
    /// Send `request`, resolve its chain and judge the terminal against
    /// `payload`. `None` when the request itself failed.
    pub async fn probe(
        &self,
        request: ProbeRequest,
        injection: InjectionPoint,
        payload: &str,
        method: RedirectMethod,
    ) -> Option<Finding> {
        let callback = self.config.callback_host.as_deref();
        let target = self.target;
        let outcome = self
            .resolver
            .resolve(&request, |candidate: &str| {
                is_valid_exploit(target, candidate, payload, callback)
            })
            .await;
        let status = outcome.initial_status?;

        let method = match outcome.body_redirect.as_ref().map(|b| b.signal) {
            Some(BodySignal::MetaRefresh) => RedirectMethod::MetaRefresh,
            Some(BodySignal::Script) => RedirectMethod::JavaScript,
            None => method,
        };
        let mut finding = Finding::new(target, &request.url, injection, payload, method);
        finding.status = Some(status);
        finding.vulnerable = outcome
            .terminal
            .as_deref()
            .map_or(false, |t| is_valid_exploit(target, t, payload, callback));
        finding.terminal_location = outcome.terminal;
        finding.redirect_chain = outcome.hops;
        finding.evidence_headers = outcome.evidence;
        Some(finding)
    }
}

/// Accumulates findings for one target and signals the fast-mode stop.
#[derive(Debug)]
pub struct FindingCollector {
    fast: bool,
    findings: Vec<Finding>,
}

impl FindingCollector {
    pub fn new(fast: bool) -> Self {
        Self {
            fast,
            findings: Vec::new(),
        }
    }

    /// Store `finding`, rating it first when vulnerable.
    pub fn record(&mut self, mut finding: Finding) -> ControlFlow<()> {
        severity::enrich(&mut finding);
        let stop = self.fast && finding.vulnerable;
        if finding.vulnerable {
            info!(
                url = %finding.target,
                injection = %finding.injection,
                payload = %finding.payload,
                severity = finding.severity.map(|s| s.label()).unwrap_or("-"),
                "vulnerable"
            );
        } else {
            debug!(url = %finding.target, injection = %finding.injection, payload = %finding.payload, "not vulnerable");
        }
        self.findings.push(finding);
        if stop {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    pub fn has_vulnerable(&self) -> bool {
        self.findings.iter().any(|f| f.vulnerable)
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

#[async_trait]
pub trait VectorTester: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &ScanContext<'_>, sink: &mut FindingCollector) -> ControlFlow<()>;
}
