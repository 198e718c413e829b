use std::ops::ControlFlow;

use async_trait::async_trait;
use tracing::debug;

use crate::http::ProbeRequest;
use crate::models::{InjectionPoint, RedirectMethod};
use crate::payloads::VectorKind;

use super::{FindingCollector, ScanContext, VectorTester};

pub const FORM_FIELDS: &[&str] = &["redirect_to", "next", "return", "success_url", "failure_url"];

pub fn has_form(body: &str) -> bool {
    body.to_ascii_lowercase().contains("<form")
}

pub struct FormTester;

#[async_trait]
impl VectorTester for FormTester {
    fn name(&self) -> &'static str {
        "form"
    }

    async fn run(&self, ctx: &ScanContext<'_>, sink: &mut FindingCollector) -> ControlFlow<()> {
        let page = match ctx.resolver.transport().send(&ProbeRequest::get(ctx.target)).await {
            Ok(page) => page,
            Err(e) => {
                debug!(url = ctx.target, error = %e, "form discovery failed");
                return ControlFlow::Continue(());
            }
        };
        if page.status != 200 || !has_form(&page.body) {
            debug!(url = ctx.target, status = page.status, "no form to test");
            return ControlFlow::Continue(());
        }

        let payloads = ctx.payloads.for_vector(VectorKind::Form, ctx.config.fast);
        for field in FORM_FIELDS.iter() {
            for payload in payloads.iter() {
                let request = ProbeRequest::post_form(ctx.target, vec![(field.to_string(), payload.clone())]);
                let finding = ctx
                    .probe(
                        request,
                        InjectionPoint::FormField(field.to_string()),
                        payload,
                        RedirectMethod::FormPost,
                    )
                    .await;
                if let Some(finding) = finding {
                    sink.record(finding)?;
                }
            }
        }
        ControlFlow::Continue(())
    }
}
