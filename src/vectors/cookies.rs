use std::ops::ControlFlow;

use async_trait::async_trait;
use itertools::iproduct;

use crate::http::ProbeRequest;
use crate::models::{InjectionPoint, RedirectMethod};
use crate::payloads::VectorKind;

use super::{FindingCollector, ScanContext, VectorTester};

pub const REDIRECT_COOKIES: &[&str] = &[
    "redirect_url",
    "redirect_uri",
    "return_url",
    "return_to",
    "next_url",
    "next",
    "url_redirect",
    "redirect",
    "return",
    "target",
    "goto",
    "location_cookie",
    "dest",
    "destination",
    "redir_url",
    "callback_url",
    "redirect_after_login",
];

pub struct CookieTester;

#[async_trait]
impl VectorTester for CookieTester {
    fn name(&self) -> &'static str {
        "cookie"
    }

    async fn run(&self, ctx: &ScanContext<'_>, sink: &mut FindingCollector) -> ControlFlow<()> {
        let payloads = ctx.payloads.for_vector(VectorKind::Cookie, ctx.config.fast);
        for (cookie, payload) in iproduct!(REDIRECT_COOKIES.iter(), payloads.iter()) {
            let request = ProbeRequest::get(ctx.target).with_cookie(cookie, payload);
            let finding = ctx
                .probe(
                    request,
                    InjectionPoint::Cookie(cookie.to_string()),
                    payload,
                    RedirectMethod::Cookie,
                )
                .await;
            if let Some(finding) = finding {
                sink.record(finding)?;
            }
        }
        ControlFlow::Continue(())
    }
}
