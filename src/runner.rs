use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use indicatif::ProgressBar;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::http::client::ClientBuildError;
use crate::http::{ClientConfig, HttpClient, HttpTransport};
use crate::models::Finding;
use crate::output;
use crate::payloads::PayloadSet;
use crate::redirect::DEFAULT_MAX_HOPS;
use crate::scanner::{ScanConfig, Scanner};

#[derive(Clone, Debug)]
pub enum PayloadSource {
    FilePath(String),
    Inline(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct Options {
    pub urls: Vec<String>,
    pub input_file: Option<String>,
    /// Custom URL-parameter payloads; the built-in list when unset.
    pub payloads: Option<PayloadSource>,
    pub concurrency: u32,
    pub rate: u32,
    pub delay_ms: u64,
    pub timeout_seconds: u64,
    pub max_hops: usize,
    pub callback_host: Option<String>,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub header: Option<String>,
    pub fast: bool,
    pub test_headers: bool,
    pub params: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            input_file: None,
            payloads: None,
            concurrency: 10,
            rate: 0,
            delay_ms: 0,
            timeout_seconds: 10,
            max_hops: DEFAULT_MAX_HOPS,
            callback_host: None,
            user_agent: None,
            proxy: None,
            header: None,
            fast: false,
            test_headers: false,
            params: Vec::new(),
        }
    }
}

impl Options {
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            max_hops: self.max_hops,
            callback_host: self
                .callback_host
                .clone()
                .filter(|c| !c.trim().is_empty()),
            fast: self.fast,
            test_headers: self.test_headers,
            params: self
                .params
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout_seconds: self.timeout_seconds,
            proxy: self.proxy.clone(),
            user_agent: self.user_agent.clone(),
            header: self.header.clone(),
            rate: self.rate,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no targets provided (urls and input_file are both empty)")]
    NoTargets,

    #[error("payloads list is empty")]
    EmptyPayloads,

    #[error("invalid max_hops {value}, expected positive integer")]
    InvalidMaxHops { value: usize },

    #[error("invalid timeout {value}, expected positive integer")]
    InvalidTimeout { value: u64 },

    #[error("failed to open file for {kind}: {path}: {source}")]
    FileOpen {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read lines for {kind}: {path}: {source}")]
    FileRead {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    HttpClient(#[from] ClientBuildError),

    #[error("task join failed: {source}")]
    TaskJoin {
        #[source]
        source: tokio::task::JoinError,
    },
}

#[derive(Clone, Debug)]
pub struct ScanReport {
    pub elapsed: Duration,
    pub targets: Vec<String>,
    /// Findings grouped by target, targets in input order.
    pub findings: Vec<Finding>,
    pub total_requests: u64,
}

impl ScanReport {
    pub fn vulnerable(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.vulnerable)
    }
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
}

impl Runner {
    pub fn new(options: Options) -> Result<Self, RunnerError> {
        if options.urls.iter().all(|u| u.trim().is_empty())
            && options
                .input_file
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            return Err(RunnerError::NoTargets);
        }
        if options.max_hops == 0 {
            return Err(RunnerError::InvalidMaxHops {
                value: options.max_hops,
            });
        }
        if options.timeout_seconds == 0 {
            return Err(RunnerError::InvalidTimeout {
                value: options.timeout_seconds,
            });
        }
        Ok(Self { options })
    }

    pub async fn run(&self) -> Result<ScanReport, RunnerError> {
        self.run_with_progress(ProgressBar::hidden()).await
    }

    pub async fn run_with_progress(&self, pb: ProgressBar) -> Result<ScanReport, RunnerError> {
        let client = HttpClient::new(&self.options.client_config())?;
        self.run_with_transport(client.into_shared(), pb).await
    }

    /// Scan every target through `transport`.
    pub async fn run_with_transport(
        &self,
        transport: Arc<dyn HttpTransport>,
        pb: ProgressBar,
    ) -> Result<ScanReport, RunnerError> {
        let started_at = Instant::now();

        let custom = match self.options.payloads.as_ref() {
            Some(source) => {
                let loaded = load_payloads(source).await?;
                if loaded.is_empty() {
                    return Err(RunnerError::EmptyPayloads);
                }
                Some(loaded)
            }
            None => None,
        };
        let payloads = PayloadSet::new(custom, self.options.callback_host.as_deref());

        let targets = load_targets(&self.options.urls, self.options.input_file.as_deref()).await?;
        pb.set_length(targets.len() as u64);

        let scanner = Arc::new(Scanner::new(
            transport.clone(),
            self.options.scan_config(),
            payloads,
        ));

        let findings = if self.options.fast {
            info!(targets = targets.len(), "fast mode: scanning targets sequentially");
            scan_sequential(&scanner, &targets, &pb).await
        } else {
            scan_pool(&scanner, &targets, self.options.concurrency, &pb).await?
        };

        Ok(ScanReport {
            elapsed: started_at.elapsed(),
            targets,
            findings,
            total_requests: transport.requests_sent(),
        })
    }
}

fn report_target(pb: &ProgressBar, findings: &[Finding]) {
    for finding in findings.iter().filter(|f| f.vulnerable) {
        pb.println(output::console_line(finding));
    }
    pb.inc(1);
}

async fn scan_sequential(scanner: &Scanner, targets: &[String], pb: &ProgressBar) -> Vec<Finding> {
    let mut out = Vec::new();
    for target in targets.iter() {
        pb.set_message(target.clone());
        let findings = scanner.scan_target(target).await;
        report_target(pb, &findings);
        out.extend(findings);
    }
    out
}

struct TargetJob {
    index: usize,
    url: String,
}

struct TargetResult {
    index: usize,
    findings: Vec<Finding>,
}

async fn scan_pool(
    scanner: &Arc<Scanner>,
    targets: &[String],
    concurrency: u32,
    pb: &ProgressBar,
) -> Result<Vec<Finding>, RunnerError> {
    let (job_tx, mut job_rx) = mpsc::channel::<TargetJob>(1024);
    let (result_tx, mut result_rx) = mpsc::channel::<TargetResult>(1024);

    let worker_count = (concurrency.max(1) as usize).min(targets.len().max(1));
    let mut worker_job_rxs = Vec::with_capacity(worker_count);
    let mut worker_job_txs = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let (tx, rx) = mpsc::channel::<TargetJob>(1024);
        worker_job_txs.push(tx);
        worker_job_rxs.push(rx);
    }

    let dispatch_jobs_handle = tokio::spawn(async move {
        let mut idx = 0usize;
        while let Some(job) = job_rx.recv().await {
            if worker_job_txs.is_empty() {
                break;
            }
            let tx = worker_job_txs[idx % worker_job_txs.len()].clone();
            let _ = tx.send(job).await;
            idx = idx.wrapping_add(1);
        }
    });

    let mut workers = FuturesUnordered::new();
    for mut jrx in worker_job_rxs {
        let scanner = scanner.clone();
        let rtx = result_tx.clone();
        let wpb = pb.clone();
        workers.push(task::spawn(async move {
            while let Some(job) = jrx.recv().await {
                wpb.set_message(job.url.clone());
                let findings = scanner.scan_target(&job.url).await;
                report_target(&wpb, &findings);
                if rtx
                    .send(TargetResult {
                        index: job.index,
                        findings,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let collect_handle = task::spawn(async move {
        let mut out: Vec<TargetResult> = Vec::new();
        while let Some(result) = result_rx.recv().await {
            out.push(result);
        }
        out
    });

    for (index, url) in targets.iter().enumerate() {
        let job = TargetJob {
            index,
            url: url.clone(),
        };
        if job_tx.send(job).await.is_err() {
            break;
        }
    }
    drop(job_tx);

    dispatch_jobs_handle
        .await
        .map_err(|e| RunnerError::TaskJoin { source: e })?;
    while let Some(joined) = workers.next().await {
        if let Err(e) = joined {
            warn!(error = %e, "scan worker failed");
        }
    }

    let mut results = collect_handle
        .await
        .map_err(|e| RunnerError::TaskJoin { source: e })?;
    results.sort_by_key(|r| r.index);
    Ok(results.into_iter().flat_map(|r| r.findings).collect())
}

/// Normalize a raw target: `http://` is assumed when no scheme is given.
/// `None` for other schemes or when the result has no host.
pub fn normalize_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else if lower.contains("://") {
        return None;
    } else {
        format!("http://{raw}")
    };
    let url = reqwest::Url::parse(&candidate).ok()?;
    url.host_str().filter(|h| !h.is_empty())?;
    Some(candidate)
}

pub(crate) async fn load_targets(
    urls: &[String],
    input_file: Option<&str>,
) -> Result<Vec<String>, RunnerError> {
    let mut raw: Vec<(String, String)> = Vec::new();
    for (i, u) in urls.iter().enumerate() {
        raw.push((format!("argument {}", i + 1), u.clone()));
    }

    if let Some(path) = input_file.filter(|p| !p.trim().is_empty()) {
        let path = crate::config::expand_tilde_string(path);
        let handle = File::open(&path).await.map_err(|e| RunnerError::FileOpen {
            kind: "input_file",
            path: path.clone(),
            source: e,
        })?;
        let mut lines = BufReader::new(handle).lines();
        let mut line_no = 0usize;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    line_no += 1;
                    raw.push((format!("{path} line {line_no}"), line));
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(RunnerError::FileRead {
                        kind: "input_file",
                        path,
                        source: e,
                    })
                }
            }
        }
    }

    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (origin, line) in raw {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match normalize_target(line) {
            Some(target) => {
                if seen.insert(target.clone()) {
                    out.push(target);
                }
            }
            None => warn!(origin = %origin, value = line, "skipping invalid target"),
        }
    }

    if out.is_empty() {
        return Err(RunnerError::NoTargets);
    }
    Ok(out)
}

pub(crate) async fn load_payloads(source: &PayloadSource) -> Result<Vec<String>, RunnerError> {
    match source {
        PayloadSource::Inline(values) => Ok(values
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()),
        PayloadSource::FilePath(path) => {
            let path = crate::config::expand_tilde_string(path.as_str());
            let handle = File::open(&path).await.map_err(|e| RunnerError::FileOpen {
                kind: "payloads",
                path: path.clone(),
                source: e,
            })?;
            let mut out = Vec::new();
            let mut lines = BufReader::new(handle).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        out.push(line.to_string());
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(RunnerError::FileRead {
                            kind: "payloads",
                            path,
                            source: e,
                        })
                    }
                }
            }
            Ok(out)
        }
    }
}
