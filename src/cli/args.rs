use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "redirx",
    version,
    about = "open-redirect pentesting tool",
    long_about = "Redirx probes URL parameters, headers, form fields and cookies for open redirects, follows the resulting redirect chains and rates every confirmed finding.\n\nExamples:\n  redirx -u 'https://target.tld/login?next=/home'\n  redirx -i targets.txt -c 20 --rate 50 -o findings.json\n  redirx -u https://target.tld/ --headers --callback abc123.oast.example\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        visible_alias = "nc",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write findings to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'O',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text, json or xml (inferred from the file extension when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'a',
        long = "all",
        visible_alias = "report-all",
        help_heading = "Output",
        help = "Include non-vulnerable results in the output file."
    )]
    pub report_all: bool,

    #[arg(
        short = 'u',
        long = "u",
        visible_alias = "url",
        value_name = "URL",
        action = ArgAction::Append,
        help_heading = "Input",
        help = "Target URL (repeatable)."
    )]
    pub url: Vec<String>,

    #[arg(
        short = 'i',
        long = "if",
        visible_alias = "input-file",
        value_name = "FILE",
        help_heading = "Input",
        help = "Load target URLs from a file (one per line, '#' starts a comment)."
    )]
    pub input_file: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.redirx/config.yml when it exists)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "init-config",
        help_heading = "Input",
        help = "Write a commented default config file to ~/.redirx/config.yml and exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 'p',
        long = "pl",
        visible_alias = "payloads",
        value_name = "FILE",
        help_heading = "Scan",
        help = "Custom URL-parameter payloads (one per line). Built-in payloads are used otherwise."
    )]
    pub payloads: Option<String>,

    #[arg(
        short = 'P',
        long = "param",
        value_name = "NAME",
        action = ArgAction::Append,
        help_heading = "Scan",
        help = "Parameter name to inject (repeatable). Replaces parameter discovery."
    )]
    pub param: Vec<String>,

    #[arg(
        long = "cb",
        visible_alias = "callback",
        value_name = "HOST",
        help_heading = "Scan",
        help = "Callback host that replaces evil.com in built-in payloads and counts as the only attacker host."
    )]
    pub callback: Option<String>,

    #[arg(
        long = "mh",
        visible_alias = "max-hops",
        value_name = "N",
        help_heading = "Scan",
        help = "Maximum redirect hops to follow per probe (default 5)."
    )]
    pub max_hops: Option<usize>,

    #[arg(
        short = 'f',
        long = "fast",
        help_heading = "Scan",
        help = "Stop each target at its first confirmed finding and scan targets one at a time."
    )]
    pub fast: bool,

    #[arg(
        long = "hdr-test",
        visible_alias = "headers",
        help_heading = "Scan",
        help = "Also inject payloads into request headers."
    )]
    pub headers: bool,

    #[arg(
        short = 'c',
        long = "cnc",
        visible_alias = "concurrency",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of targets scanned concurrently (default 10)."
    )]
    pub concurrency: Option<u32>,

    #[arg(
        short = 'w',
        long = "wrk",
        visible_alias = "workers",
        value_name = "N",
        help_heading = "Performance",
        help = "Tokio worker threads (default 10)."
    )]
    pub workers: Option<usize>,

    #[arg(
        short = 'r',
        long = "rt",
        visible_alias = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Request rate limit across all workers (requests per second, 0 disables)."
    )]
    pub rate: Option<u32>,

    #[arg(
        short = 'd',
        long = "dl",
        visible_alias = "delay",
        value_name = "MS",
        help_heading = "Performance",
        help = "Delay before every request in milliseconds."
    )]
    pub delay: Option<u64>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds (default 10)."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'x',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Route every request through this proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'A',
        long = "ua",
        visible_alias = "user-agent",
        value_name = "UA",
        help_heading = "HTTP",
        help = "Fixed User-Agent (browser user agents rotate otherwise)."
    )]
    pub user_agent: Option<String>,

    #[arg(
        short = 'H',
        long = "hd",
        visible_alias = "header",
        value_name = "'Key: Value'",
        help_heading = "HTTP",
        help = "Extra header sent with every request."
    )]
    pub header: Option<String>,
}
