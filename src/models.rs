use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Where a payload is placed in the request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum InjectionPoint {
    QueryParameter(String),
    Header(String),
    Cookie(String),
    FormField(String),
}

impl InjectionPoint {
    pub fn name(&self) -> &str {
        match self {
            InjectionPoint::QueryParameter(name)
            | InjectionPoint::Header(name)
            | InjectionPoint::Cookie(name)
            | InjectionPoint::FormField(name) => name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            InjectionPoint::QueryParameter(_) => "parameter",
            InjectionPoint::Header(_) => "header",
            InjectionPoint::Cookie(_) => "cookie",
            InjectionPoint::FormField(_) => "form field",
        }
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind_label(), self.name())
    }
}

/// How the redirect was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RedirectMethod {
    #[serde(rename = "URL Parameter")]
    UrlParameter,
    #[serde(rename = "Header Injection")]
    HeaderInjection,
    #[serde(rename = "Form POST Redirect")]
    FormPost,
    #[serde(rename = "Cookie Redirect")]
    Cookie,
    #[serde(rename = "Meta Refresh")]
    MetaRefresh,
    #[serde(rename = "JavaScript Redirect")]
    JavaScript,
}

impl RedirectMethod {
    pub fn label(&self) -> &'static str {
        match self {
            RedirectMethod::UrlParameter => "URL Parameter",
            RedirectMethod::HeaderInjection => "Header Injection",
            RedirectMethod::FormPost => "Form POST Redirect",
            RedirectMethod::Cookie => "Cookie Redirect",
            RedirectMethod::MetaRefresh => "Meta Refresh",
            RedirectMethod::JavaScript => "JavaScript Redirect",
        }
    }
}

impl fmt::Display for RedirectMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity attached to a vulnerable finding. `Undetermined` marks a finding
/// whose classification failed; the finding itself is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindingSeverity {
    Rated(Severity),
    Undetermined,
}

impl Serialize for FindingSeverity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl FindingSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            FindingSeverity::Rated(severity) => severity.label(),
            FindingSeverity::Undetermined => "Undetermined",
        }
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One step in a redirect chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RedirectHop {
    /// URL of the request whose response produced this hop.
    pub url: String,
    pub status: u16,
    /// Raw `Location` value, or the extracted meta/script target.
    pub location: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Finding {
    pub target: String,
    /// The request URL actually sent (the target with the payload applied
    /// for parameter injection, the target itself otherwise).
    pub tested_url: String,
    pub injection: InjectionPoint,
    pub payload: String,
    pub method: RedirectMethod,
    pub vulnerable: bool,
    /// Status of the first response to the tested request.
    pub status: Option<u16>,
    pub terminal_location: Option<String>,
    pub redirect_chain: Vec<RedirectHop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<FindingSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_headers: Option<BTreeMap<String, String>>,
}

impl Finding {
    pub fn new(
        target: &str,
        tested_url: &str,
        injection: InjectionPoint,
        payload: &str,
        method: RedirectMethod,
    ) -> Self {
        Self {
            target: target.to_string(),
            tested_url: tested_url.to_string(),
            injection,
            payload: payload.to_string(),
            method,
            vulnerable: false,
            status: None,
            terminal_location: None,
            redirect_chain: Vec::new(),
            severity: None,
            evidence_headers: None,
        }
    }
}
