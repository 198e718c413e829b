use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;

use crate::models::{Finding, FindingSeverity, RedirectHop, Severity};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Xml,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".xml") {
        return Some(OutputFormat::Xml);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

/// Flat, export-friendly view of a finding.
#[derive(Clone, Debug, Serialize)]
pub struct OutputRecord {
    pub target: String,
    pub tested_url: String,
    pub injection_type: String,
    pub injection_name: String,
    pub payload: String,
    pub method: String,
    pub vulnerable: bool,
    pub status: Option<u16>,
    pub terminal_location: Option<String>,
    pub severity: Option<String>,
    pub redirect_chain: Vec<RedirectHop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_headers: Option<BTreeMap<String, String>>,
}

/// Records for export. Non-vulnerable results only with `report_all`.
pub fn build_records(findings: &[Finding], report_all: bool) -> Vec<OutputRecord> {
    findings
        .iter()
        .filter(|f| report_all || f.vulnerable)
        .map(|f| OutputRecord {
            target: f.target.clone(),
            tested_url: f.tested_url.clone(),
            injection_type: f.injection.kind_label().to_string(),
            injection_name: f.injection.name().to_string(),
            payload: f.payload.clone(),
            method: f.method.label().to_string(),
            vulnerable: f.vulnerable,
            status: f.status,
            terminal_location: f.terminal_location.clone(),
            severity: f.severity.map(|s| s.label().to_string()),
            redirect_chain: f.redirect_chain.clone(),
            evidence_headers: f.evidence_headers.clone(),
        })
        .collect()
}

pub fn render_text(records: &[OutputRecord]) -> Vec<u8> {
    let mut out = String::new();
    for r in records {
        let verdict = if r.vulnerable { "VULNERABLE" } else { "not vulnerable" };
        out.push_str(&format!(
            "[{}] {} | {} {} | payload: {} | method: {} | severity: {} | redirects to: {}\n",
            verdict,
            r.tested_url,
            r.injection_type,
            r.injection_name,
            r.payload,
            r.method,
            r.severity.as_deref().unwrap_or("-"),
            r.terminal_location.as_deref().unwrap_or("-"),
        ));
    }
    out.into_bytes()
}

pub fn render_json(records: &[OutputRecord]) -> Vec<u8> {
    serde_json::to_vec_pretty(records).unwrap_or_else(|_| b"[]\n".to_vec())
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn render_xml(records: &[OutputRecord]) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str("<findings>\n");
    for r in records {
        out.push_str(&format!("  <finding vulnerable=\"{}\">\n", r.vulnerable));
        out.push_str(&format!("    <target>{}</target>\n", escape_xml(&r.target)));
        out.push_str(&format!(
            "    <tested_url>{}</tested_url>\n",
            escape_xml(&r.tested_url)
        ));
        out.push_str(&format!(
            "    <injection type=\"{}\">{}</injection>\n",
            escape_xml(&r.injection_type),
            escape_xml(&r.injection_name)
        ));
        out.push_str(&format!("    <payload>{}</payload>\n", escape_xml(&r.payload)));
        out.push_str(&format!("    <method>{}</method>\n", escape_xml(&r.method)));
        if let Some(status) = r.status {
            out.push_str(&format!("    <status>{}</status>\n", status));
        }
        if let Some(terminal) = r.terminal_location.as_deref() {
            out.push_str(&format!(
                "    <terminal_location>{}</terminal_location>\n",
                escape_xml(terminal)
            ));
        }
        if let Some(severity) = r.severity.as_deref() {
            out.push_str(&format!("    <severity>{}</severity>\n", escape_xml(severity)));
        }
        out.push_str("    <redirect_chain>\n");
        for hop in &r.redirect_chain {
            out.push_str(&format!(
                "      <hop status=\"{}\" url=\"{}\">{}</hop>\n",
                hop.status,
                escape_xml(&hop.url),
                escape_xml(&hop.location)
            ));
        }
        out.push_str("    </redirect_chain>\n");
        if let Some(headers) = r.evidence_headers.as_ref() {
            out.push_str("    <evidence_headers>\n");
            for (k, v) in headers {
                out.push_str(&format!(
                    "      <header name=\"{}\">{}</header>\n",
                    escape_xml(k),
                    escape_xml(v)
                ));
            }
            out.push_str("    </evidence_headers>\n");
        }
        out.push_str("  </finding>\n");
    }
    out.push_str("</findings>\n");
    out.into_bytes()
}

pub fn render(format: OutputFormat, records: &[OutputRecord]) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(records),
        OutputFormat::Json => render_json(records),
        OutputFormat::Xml => render_xml(records),
    }
}

fn colored_severity(severity: Option<FindingSeverity>) -> String {
    match severity {
        Some(FindingSeverity::Rated(Severity::High)) => "High".red().bold().to_string(),
        Some(FindingSeverity::Rated(Severity::Medium)) => "Medium".yellow().bold().to_string(),
        Some(FindingSeverity::Rated(Severity::Low)) => "Low".blue().to_string(),
        Some(FindingSeverity::Undetermined) => "Undetermined".white().to_string(),
        None => "-".to_string(),
    }
}

/// One colored console line for a vulnerable finding.
pub fn console_line(finding: &Finding) -> String {
    format!(
        "{} {} - {}, payload: {}, method: {}, severity: {}, redirects to: {}",
        "[VULN]".red().bold(),
        finding.tested_url.as_str().bold(),
        finding.injection,
        finding.payload.as_str().cyan(),
        finding.method,
        colored_severity(finding.severity),
        finding.terminal_location.as_deref().unwrap_or("-").green(),
    )
}

/// Vulnerable findings counted per severity label, `High` first.
pub fn severity_counts(findings: &[Finding]) -> Vec<(&'static str, usize)> {
    let order = ["High", "Medium", "Low", "Undetermined"];
    order
        .iter()
        .map(|label| {
            let n = findings
                .iter()
                .filter(|f| f.vulnerable && f.severity.map(|s| s.label()) == Some(*label))
                .count();
            (*label, n)
        })
        .filter(|(_, n)| *n > 0)
        .collect()
}
