use thiserror::Error;

use crate::models::{Finding, FindingSeverity, Severity};

use super::host::{is_script_uri, normalize};
use super::validator::is_valid_exploit;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("vulnerable finding for {target} has no terminal location")]
    MissingTerminal { target: String },
}

/// Severity of a redirect from `original` to `terminal`. Never fails; any
/// unparsable input lands on `Low`.
pub fn classify(original: &str, terminal: &str, payload: &str) -> Severity {
    if is_script_uri(terminal) {
        return Severity::High;
    }
    if is_valid_exploit(original, terminal, payload, None) {
        return Severity::High;
    }

    let lower = terminal.trim_start().to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")) {
        return Severity::Low;
    }
    match (normalize(original), normalize(terminal)) {
        (Some(a), Some(b)) if a != b => Severity::Medium,
        (Some(_), Some(_)) => Severity::Low,
        (None, Some(_)) => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Severity for a finding about to be recorded.
pub fn assess(finding: &Finding) -> Result<Severity, ClassificationError> {
    let terminal = finding
        .terminal_location
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ClassificationError::MissingTerminal {
            target: finding.target.clone(),
        })?;
    Ok(classify(&finding.target, terminal, &finding.payload))
}

/// Attach severity to `finding` when it is vulnerable. A classification
/// failure marks it undetermined instead of dropping it.
pub fn enrich(finding: &mut Finding) {
    if !finding.vulnerable {
        finding.severity = None;
        return;
    }
    finding.severity = Some(match assess(finding) {
        Ok(severity) => FindingSeverity::Rated(severity),
        Err(e) => {
            tracing::debug!(error = %e, "severity undetermined");
            FindingSeverity::Undetermined
        }
    });
}
