use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(max_hops) = args.max_hops {
        if max_hops == 0 {
            return Err("invalid max-hops, expected positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive number of seconds".to_string());
        }
    }
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err("invalid workers, expected positive integer".to_string());
        }
    }
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            return Err("invalid concurrency, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text, json or xml"
            ));
        }
    }
    if let Some(raw) = args.header.as_deref() {
        crate::http::client::parse_header_line(raw)
            .ok_or_else(|| format!("invalid --header '{raw}', expected 'Key: Value'"))?;
    }
    if let Some(callback) = args.callback.as_deref() {
        if crate::redirect::normalize(callback).is_none() {
            return Err(format!("invalid --callback '{callback}', expected a host"));
        }
    }
    if args.param.iter().any(|p| p.trim().is_empty()) {
        return Err("invalid --param, expected a non-empty name".to_string());
    }
    Ok(())
}
