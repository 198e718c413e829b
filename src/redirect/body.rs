//! Client-side redirect signals found in HTML bodies.

use std::sync::OnceLock;

use regex::Regex;

/// Script sinks in the order they are tried.
const SCRIPT_PATTERNS: &[&str] = &[
    r#"window\.location\s*=\s*["']([^"']+)["']"#,
    r#"window\.location\.href\s*=\s*["']([^"']+)["']"#,
    r#"document\.location\s*=\s*["']([^"']+)["']"#,
    r#"location\.replace\(\s*["']([^"']+)["']\s*\)"#,
    r#"location\.href\s*=\s*["']([^"']+)["']"#,
    r#"location\.assign\(\s*["']([^"']+)["']\s*\)"#,
    r#"window\.open\(\s*["']([^"']+)["']"#,
    r#"document\.location\.href\s*=\s*["']([^"']+)["']"#,
    r#"top\.location\s*=\s*["']([^"']+)["']"#,
    r#"parent\.location\s*=\s*["']([^"']+)["']"#,
];

fn meta_tag() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<meta\b[^>]*>").ok()).as_ref()
}

fn refresh_equiv() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)http-equiv\s*=\s*["']?\s*refresh"#).ok())
        .as_ref()
}

fn refresh_content() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)content\s*=\s*["']?\s*\d+\s*;\s*url\s*=\s*['"]?([^"'>\s]+)"#).ok()
    })
    .as_ref()
}

fn script_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        SCRIPT_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){p}")).ok())
            .collect()
    })
}

/// Target of the first `<meta http-equiv="refresh">` tag carrying a URL.
pub fn meta_refresh_target(body: &str) -> Option<String> {
    let (tags, equiv, content) = (meta_tag()?, refresh_equiv()?, refresh_content()?);
    tags.find_iter(body)
        .map(|m| m.as_str())
        .filter(|tag| equiv.is_match(tag))
        .find_map(|tag| content.captures(tag))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every script redirect candidate, pattern priority first and document
/// order within a pattern.
pub fn script_redirect_targets(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    for re in script_patterns() {
        for caps in re.captures_iter(body) {
            if let Some(m) = caps.get(1) {
                out.push(m.as_str().to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_refresh_is_extracted_in_any_attribute_order() {
        let body = r#"<html><head><META content="0; URL=https://evil.com/x" HTTP-EQUIV="Refresh"></head></html>"#;
        assert_eq!(meta_refresh_target(body).as_deref(), Some("https://evil.com/x"));

        let body = "<meta http-equiv=refresh content='5;url=//evil.com'>";
        assert_eq!(meta_refresh_target(body).as_deref(), Some("//evil.com"));
    }

    #[test]
    fn meta_without_refresh_or_url_is_ignored() {
        assert_eq!(meta_refresh_target(r#"<meta content="0;url=http://evil.com">"#), None);
        assert_eq!(meta_refresh_target(r#"<meta http-equiv="refresh" content="30">"#), None);
        assert_eq!(meta_refresh_target("<p>content=\"0;url=http://evil.com\"</p>"), None);
    }

    #[test]
    fn script_targets_follow_pattern_priority() {
        let body = r#"
            <script>
              location.replace('http://second.example');
              window.location = "http://first.example";
              window.open('http://third.example', '_self');
            </script>"#;
        let targets = script_redirect_targets(body);
        assert_eq!(targets.first().map(String::as_str), Some("http://first.example"));
        assert!(targets.iter().any(|t| t == "http://second.example"));
        assert!(targets.iter().any(|t| t == "http://third.example"));
    }

    #[test]
    fn script_patterns_ignore_case() {
        let targets = script_redirect_targets("TOP.LOCATION = '//evil.com'");
        assert_eq!(targets, vec!["//evil.com".to_string()]);
        assert!(script_redirect_targets("var location_name = 'x';").is_empty());
    }
}
