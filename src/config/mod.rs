use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Values read from `~/.redirx/config.yml`. Every field is optional; CLI
/// flags win over anything set here.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub urls: Option<Vec<String>>,
    pub input_file: Option<String>,
    pub payloads: Option<String>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub report_all: Option<bool>,
    pub concurrency: Option<u32>,
    pub workers: Option<usize>,
    pub rate: Option<u32>,
    #[serde(alias = "delay")]
    pub delay_ms: Option<u64>,
    pub timeout: Option<u64>,
    #[serde(alias = "follow_redirects")]
    pub max_hops: Option<usize>,
    #[serde(alias = "callback_url")]
    pub callback: Option<String>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub fast: Option<bool>,
    pub headers_test: Option<bool>,
    pub params: Option<Vec<String>>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".redirx").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

/// An empty or comment-only document is an empty config.
pub fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    if contents
        .lines()
        .all(|l| l.trim().is_empty() || l.trim_start().starts_with('#'))
    {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
}

pub fn default_config_yaml() -> String {
    r#"# redirx config
#
# Location (default):
#   ~/.redirx/config.yml

# Targets (choose at least one)
# urls:
#   - https://example.com/login?next=/home
# input_file: ./targets.txt

# Output (optional)
# output: ./findings.json
# output_format: json
report_all: false

# Performance
concurrency: 10
workers: 10
# Requests per second across all workers, 0 disables the limit.
rate: 0
delay_ms: 0
timeout: 10

# Redirect handling
max_hops: 5
# callback: your-id.oast.example

# Payloads (optional, one per line). Built-in payloads are used otherwise.
# payloads: ./payloads/redirects.txt
# params:
#   - next
#   - returnUrl

# HTTP (optional)
# user_agent: "Mozilla/5.0 ..."
# proxy: http://127.0.0.1:8080
# header: "Key: Value"

# Scan mode
fast: false
headers_test: false

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
