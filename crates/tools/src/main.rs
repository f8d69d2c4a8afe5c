//! Command-line front end: analyze a captured page load from files.
//!
//! Reads the HAR (plus optional DOM snapshot and timeline), runs every
//! rule and prints the results as JSON or text.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use pagespeed::formatter::text_converter;
use pagespeed::l10n::LocaleCatalog;
use pagespeed::{EngineConfig, RunRequest, analyze, run_pagespeed_rules};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pagespeed", about = "Analyze a captured page load and suggest speed fixes")]
struct Args {
    /// HTTP archive of the page load
    #[arg(long)]
    har: PathBuf,

    /// DOM snapshot JSON
    #[arg(long)]
    dom: Option<PathBuf>,

    /// Timeline JSON
    #[arg(long)]
    timeline: Option<PathBuf>,

    /// Which resources to analyze: all, content, ads or trackers
    #[arg(long)]
    filter: Option<String>,

    /// Locale of the formatted output
    #[arg(long)]
    locale: Option<String>,

    /// Translation catalog JSON: {"<locale>": {"<source>": "<translation>"}}
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Engine configuration JSON; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Include minified bodies in the JSON output
    #[arg(long)]
    save_optimized_content: bool,

    /// Weigh savings for a mobile client
    #[arg(long)]
    mobile: bool,

    /// Keep the DOM's document URL as the primary resource
    #[arg(long)]
    no_follow_redirects: bool,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Ignored when RUST_LOG is set
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_optional(path: Option<&PathBuf>) -> Result<String> {
    path.map(|p| read(p)).transpose().map(Option::unwrap_or_default)
}

fn engine_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&read(path)?)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(filter) = &args.filter {
        config.resource_filter = filter.clone();
    }
    if let Some(locale) = &args.locale {
        config.locale = locale.clone();
    }
    config.save_optimized_content |= args.save_optimized_content;
    config.mobile |= args.mobile;
    if args.no_follow_redirects {
        config.follow_redirects = false;
    }
    Ok(config)
}

fn build_request(args: &Args) -> Result<RunRequest> {
    let mut request = RunRequest::new(&args.har.display().to_string(), &read(&args.har)?)
        .with_config(engine_config(args)?);
    request.document = read_optional(args.dom.as_ref())?;
    request.timeline = read_optional(args.timeline.as_ref())?;
    if let Some(path) = &args.catalog {
        let catalog = LocaleCatalog::from_json(&read(path)?)
            .with_context(|| format!("Invalid catalog in {}", path.display()))?;
        request.catalog = Some(Arc::new(catalog));
    }
    Ok(request)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level);

    let request = build_request(&args)?;
    tracing::debug!("Analyzing {} with filter {}", request.id, request.config.resource_filter);

    match args.format {
        OutputFormat::Json => {
            let output = run_pagespeed_rules(&request);
            if !output.success {
                bail!("pagespeed error: {}", output.error);
            }
            println!("{}", output.output);
        }
        OutputFormat::Text => {
            let analysis = analyze(&request)?;
            print!("{}", text_converter::convert(&analysis.formatted));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "pagespeed",
            "--har",
            "page.har",
            "--filter",
            "content",
            "--mobile",
            "--format",
            "text",
        ])
        .unwrap();
        assert_eq!(args.har, PathBuf::from("page.har"));
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.log_level, LogLevel::Warn);

        let config = engine_config(&args).unwrap();
        assert_eq!(config.resource_filter, "content");
        assert!(config.mobile);
        assert!(config.follow_redirects);
        assert_eq!(config.locale, "en_US");
    }

    #[test]
    fn test_har_required() {
        assert!(Args::try_parse_from(["pagespeed"]).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = Args::try_parse_from(["pagespeed", "--har", "/nonexistent/page.har"]).unwrap();
        let err = build_request(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read /nonexistent/page.har"));
    }
}
