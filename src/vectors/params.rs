use std::ops::ControlFlow;

use async_trait::async_trait;
use itertools::iproduct;
use reqwest::Url;

use crate::http::ProbeRequest;
use crate::models::{InjectionPoint, RedirectMethod};
use crate::payloads::VectorKind;

use super::{FindingCollector, ScanContext, VectorTester};

/// Parameter names commonly carrying a redirect target.
pub const REDIRECT_PARAMS: &[&str] = &[
    "url",
    "redirect",
    "return",
    "callback",
    "next",
    "target",
    "goto",
    "link",
    "forward",
    "continue",
    "destination",
    "redir",
    "location",
    "site",
    "returnUrl",
    "returnURL",
    "redirect_uri",
    "redirectUrl",
    "redirectURL",
    "returnTo",
    "return_to",
    "backUrl",
    "back_url",
    "successUrl",
    "success_url",
];

const FALLBACK_PARAM_COUNT: usize = 10;

/// Query parameters of `target` that look like redirect parameters, in
/// query order; the first common names when none do.
pub fn extract_redirect_params(target: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    if let Ok(url) = Url::parse(target) {
        for (name, _) in url.query_pairs() {
            let known = REDIRECT_PARAMS.iter().any(|p| p.eq_ignore_ascii_case(&name));
            if known && !found.iter().any(|f| f == &*name) {
                found.push(name.into_owned());
            }
        }
    }
    if found.is_empty() {
        found = REDIRECT_PARAMS
            .iter()
            .take(FALLBACK_PARAM_COUNT)
            .map(|p| p.to_string())
            .collect();
    }
    found
}

/// `target` with `param` set to the single value `payload`. Other
/// parameters keep their order and repeated values.
pub fn with_query_param(target: &str, param: &str, payload: &str) -> Option<String> {
    let mut url = Url::parse(target).ok()?;

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (k, v) in url.query_pairs() {
        match grouped.iter_mut().find(|(name, _)| name == &*k) {
            Some((_, values)) => values.push(v.into_owned()),
            None => grouped.push((k.into_owned(), vec![v.into_owned()])),
        }
    }
    match grouped.iter_mut().find(|(name, _)| name == param) {
        Some((_, values)) => *values = vec![payload.to_string()],
        None => grouped.push((param.to_string(), vec![payload.to_string()])),
    }

    url.query_pairs_mut()
        .clear()
        .extend_pairs(grouped.iter().flat_map(|(k, vs)| vs.iter().map(move |v| (k, v))));
    Some(url.to_string())
}

pub struct ParamTester;

#[async_trait]
impl VectorTester for ParamTester {
    fn name(&self) -> &'static str {
        "url-parameter"
    }

    async fn run(&self, ctx: &ScanContext<'_>, sink: &mut FindingCollector) -> ControlFlow<()> {
        let params = if ctx.config.params.is_empty() {
            extract_redirect_params(ctx.target)
        } else {
            ctx.config.params.clone()
        };
        let payloads = ctx.payloads.for_vector(VectorKind::UrlParameter, ctx.config.fast);

        for (param, payload) in iproduct!(params.iter(), payloads.iter()) {
            let Some(tested_url) = with_query_param(ctx.target, param, payload) else {
                continue;
            };
            let finding = ctx
                .probe(
                    ProbeRequest::get(&tested_url),
                    InjectionPoint::QueryParameter(param.clone()),
                    payload,
                    RedirectMethod::UrlParameter,
                )
                .await;
            if let Some(finding) = finding {
                sink.record(finding)?;
            }
        }
        ControlFlow::Continue(())
    }
}
