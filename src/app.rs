use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::output::{self, OutputFormat};
use crate::runner::{Options, PayloadSource, Runner, ScanReport};

fn print_banner() {
    const BANNER: &str = r#"
                  ___
   _______  ____/ (_)______  __
  / ___/ _ \/ __  / / ___/ |/_/
 / /  /  __/ /_/ / / /  _>  <
/_/   \___/\__,_/_/_/  /_/|_|
"#;
    print!("{}", BANNER);
    println!(
        "       v{} - open redirect pentesting tool",
        env!("CARGO_PKG_VERSION")
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("redirx={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Clone, Debug)]
struct RunConfig {
    options: Options,
    output: Option<String>,
    output_format: OutputFormat,
    report_all: bool,
    workers: usize,
    no_color: bool,
    verbose: u8,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let report_all = args.report_all || cfg.report_all.unwrap_or(false);
    let fast = args.fast || cfg.fast.unwrap_or(false);
    let test_headers = args.headers || cfg.headers_test.unwrap_or(false);

    let defaults = Options::default();
    let concurrency = args
        .concurrency
        .or(cfg.concurrency)
        .unwrap_or(defaults.concurrency);
    let workers = args.workers.or(cfg.workers).unwrap_or(10);
    let rate = args.rate.or(cfg.rate).unwrap_or(defaults.rate);
    let delay_ms = args.delay.or(cfg.delay_ms).unwrap_or(defaults.delay_ms);
    let timeout_seconds = args
        .timeout
        .or(cfg.timeout)
        .unwrap_or(defaults.timeout_seconds);
    let max_hops = args.max_hops.or(cfg.max_hops).unwrap_or(defaults.max_hops);
    if workers == 0 {
        return Err("invalid workers, expected positive integer".to_string());
    }

    let urls = if args.url.is_empty() {
        cfg.urls.unwrap_or_default()
    } else {
        args.url
    };
    let input_file = args
        .input_file
        .or(cfg.input_file)
        .map(|p| config::expand_tilde_string(&p));
    if urls.is_empty() && input_file.is_none() {
        return Err("at least one input mode must be specified (--url or --input-file)".to_string());
    }

    let payloads = args
        .payloads
        .or(cfg.payloads)
        .map(|p| PayloadSource::FilePath(config::expand_tilde_string(&p)));
    let params = if args.param.is_empty() {
        cfg.params.unwrap_or_default()
    } else {
        args.param
    };
    let callback_host = args
        .callback
        .or(cfg.callback)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format_raw = args.output_format.or(cfg.output_format);
    let output_format = match output_format_raw.as_deref() {
        Some(raw) => OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text, json or xml"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    let options = Options {
        urls,
        input_file,
        payloads,
        concurrency,
        rate,
        delay_ms,
        timeout_seconds,
        max_hops,
        callback_host,
        user_agent: args.user_agent.or(cfg.user_agent),
        proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
        header: args.header.or(cfg.header),
        fast,
        test_headers,
        params,
    };

    Ok(RunConfig {
        options,
        output,
        output_format,
        report_all,
        workers,
        no_color,
        verbose: args.verbose,
    })
}

fn print_settings(run: &RunConfig) {
    let opts = &run.options;
    let targets = match (opts.urls.len(), opts.input_file.as_deref()) {
        (0, Some(path)) => path.to_string(),
        (n, Some(path)) => format!("{n} url(s) + {path}"),
        (n, None) => format!("{n} url(s)"),
    };
    format_kv_line("Targets", &targets);
    format_kv_line(
        "Payloads",
        match opts.payloads.as_ref() {
            Some(PayloadSource::FilePath(path)) => path.as_str(),
            Some(PayloadSource::Inline(_)) => "inline",
            None => "built-in",
        },
    );
    format_kv_line("Threads", &opts.concurrency.to_string());
    format_kv_line(
        "Rate",
        &if opts.rate == 0 {
            "unlimited".to_string()
        } else {
            format!("{}/s", opts.rate)
        },
    );
    format_kv_line("Timeout", &format!("{}s", opts.timeout_seconds));
    format_kv_line("Max hops", &opts.max_hops.to_string());
    format_kv_line("Callback", opts.callback_host.as_deref().unwrap_or("-"));
    format_kv_line("Headers", format_bool(opts.test_headers));
    format_kv_line("Fast", format_bool(opts.fast));
    if let Some(proxy) = opts.proxy.as_deref() {
        format_kv_line("Proxy", proxy);
    }
    if let Some(path) = run.output.as_deref() {
        format_kv_line("Output", path);
    }
    println!();
}

fn progress_bar() -> Result<ProgressBar, String> {
    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    Ok(pb)
}

async fn write_output(run: &RunConfig, report: &ScanReport) -> Result<(), String> {
    let Some(outfile_path) = run.output.as_ref() else {
        return Ok(());
    };
    let records = output::build_records(&report.findings, run.report_all);
    let rendered = output::render(run.output_format, &records);

    let mut outfile = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(outfile_path)
        .await
        .map_err(|e| format!("failed to open output file: {e}"))?;
    outfile
        .write_all(&rendered)
        .await
        .map_err(|e| format!("failed to write output file: {e}"))?;
    Ok(())
}

fn print_summary(report: &ScanReport) {
    let vulnerable = report.vulnerable().count();
    println!();
    if vulnerable == 0 {
        println!(":: No open redirects found ::");
    } else {
        println!(
            ":: {} ::",
            format!("{vulnerable} open redirect(s) found").red().bold()
        );
        for (label, count) in output::severity_counts(&report.findings) {
            format_kv_line(label, &count.to_string());
        }
    }
    format_kv_line("Targets", &report.targets.len().to_string());
    format_kv_line("Requests", &report.total_requests.to_string());
    println!(
        ":: Completed :: scan took {}s ::",
        report.elapsed.as_secs()
    );
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();
    print_settings(&run);

    let runner = Runner::new(run.options.clone()).map_err(|e| e.to_string())?;
    let pb = progress_bar()?;
    let report = runner
        .run_with_progress(pb.clone())
        .await
        .map_err(|e| e.to_string())?;
    pb.finish_and_clear();

    write_output(&run, &report).await?;
    print_summary(&report);
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = CliArgs::try_parse().map_err(|e| match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            e.exit()
        }
        _ => e.to_string(),
    })?;

    if args.init_config {
        let path = config::default_config_path()
            .ok_or_else(|| "could not determine home directory".to_string())?;
        config::ensure_default_config_file(&path)?;
        println!("config written to {}", path.display());
        return Ok(());
    }

    let cfg = match args.config.as_ref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    init_tracing(run.verbose);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(run.workers)
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
