use tracing::trace;

use super::host::{is_script_uri, normalize};

/// Whether reaching `terminal` from `original` is a redirect the attacker
/// controls. With a callback host, only the callback host counts.
pub fn is_valid_exploit(original: &str, terminal: &str, payload: &str, callback_host: Option<&str>) -> bool {
    if is_script_uri(terminal) {
        return true;
    }

    let Some(terminal_host) = normalize(terminal) else {
        trace!(terminal, "terminal has no host");
        return false;
    };
    let original_host = normalize(original);
    let off_site = original_host.as_ref() != Some(&terminal_host);

    if let Some(callback) = callback_host.filter(|c| !c.trim().is_empty()) {
        let matched = normalize(callback).as_ref() == Some(&terminal_host);
        trace!(%terminal_host, callback, matched, off_site, "callback check");
        return matched && off_site;
    }

    let Some(payload_host) = normalize(payload) else {
        trace!(payload, "payload has no host");
        return false;
    };
    trace!(%terminal_host, %payload_host, off_site, "payload host check");
    terminal_host == payload_host && off_site
}
