use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{debug, info};

use crate::http::HttpTransport;
use crate::models::Finding;
use crate::payloads::PayloadSet;
use crate::redirect::{Resolver, DEFAULT_MAX_HOPS};
use crate::vectors::{
    CookieTester, FindingCollector, FormTester, HeaderTester, ParamTester, ScanContext, VectorTester,
};

/// Decision settings shared read-only by every worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    pub max_hops: usize,
    pub callback_host: Option<String>,
    pub fast: bool,
    pub test_headers: bool,
    /// Parameter names to inject instead of the extracted ones.
    pub params: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            callback_host: None,
            fast: false,
            test_headers: false,
            params: Vec::new(),
        }
    }
}

/// Runs every enabled tester against one target at a time.
pub struct Scanner {
    resolver: Resolver,
    config: ScanConfig,
    payloads: PayloadSet,
    testers: Vec<Box<dyn VectorTester>>,
}

impl Scanner {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ScanConfig, payloads: PayloadSet) -> Self {
        let mut testers: Vec<Box<dyn VectorTester>> = vec![Box::new(ParamTester)];
        if config.test_headers {
            testers.push(Box::new(HeaderTester));
        }
        testers.push(Box::new(FormTester));
        testers.push(Box::new(CookieTester));

        Self {
            resolver: Resolver::new(transport, config.max_hops),
            config,
            payloads,
            testers,
        }
    }

    pub fn tester_names(&self) -> Vec<&'static str> {
        self.testers.iter().map(|t| t.name()).collect()
    }

    pub fn requests_sent(&self) -> u64 {
        self.resolver.transport().requests_sent()
    }

    /// Every result for `target`. In fast mode the scan stops at the first
    /// vulnerable finding.
    pub async fn scan_target(&self, target: &str) -> Vec<Finding> {
        info!(url = target, "scanning");
        let ctx = ScanContext {
            target,
            resolver: &self.resolver,
            config: &self.config,
            payloads: &self.payloads,
        };
        let mut sink = FindingCollector::new(self.config.fast);
        for tester in self.testers.iter() {
            if let ControlFlow::Break(()) = tester.run(&ctx, &mut sink).await {
                debug!(url = target, tester = tester.name(), "fast mode: stopping after first vulnerability");
                break;
            }
        }
        sink.into_findings()
    }
}
