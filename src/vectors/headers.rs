use std::ops::ControlFlow;

use async_trait::async_trait;
use itertools::iproduct;

use crate::http::ProbeRequest;
use crate::models::{InjectionPoint, RedirectMethod};
use crate::payloads::VectorKind;

use super::{FindingCollector, ScanContext, VectorTester};

/// Headers routinely trusted for building absolute redirect URLs.
pub const PRIORITY_HEADERS: &[&str] = &["Host", "X-Forwarded-Host", "X-Real-IP", "X-HTTP-Host-Override"];

pub const EXTENDED_HEADERS: &[&str] = &[
    "X-Forwarded-For",
    "X-Forwarded-Proto",
    "X-Forwarded-Server",
    "X-Host",
    "Referer",
    "Origin",
    "X-Original-URL",
    "X-Rewrite-URL",
    "CF-Connecting-IP",
];

pub fn header_names(fast: bool) -> Vec<&'static str> {
    let mut names = PRIORITY_HEADERS.to_vec();
    if !fast {
        names.extend_from_slice(EXTENDED_HEADERS);
    }
    names
}

pub struct HeaderTester;

#[async_trait]
impl VectorTester for HeaderTester {
    fn name(&self) -> &'static str {
        "header"
    }

    async fn run(&self, ctx: &ScanContext<'_>, sink: &mut FindingCollector) -> ControlFlow<()> {
        let payloads = ctx.payloads.for_vector(VectorKind::Header, ctx.config.fast);
        let headers = header_names(ctx.config.fast);
        for (header, payload) in iproduct!(headers.iter(), payloads.iter()) {
            let request = ProbeRequest::get(ctx.target).with_header(header, payload);
            let finding = ctx
                .probe(
                    request,
                    InjectionPoint::Header(header.to_string()),
                    payload,
                    RedirectMethod::HeaderInjection,
                )
                .await;
            if let Some(finding) = finding {
                sink.record(finding)?;
            }
        }
        ControlFlow::Continue(())
    }
}
