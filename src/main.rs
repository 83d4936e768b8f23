//! report-triage - LLM-backed urgency scoring for incident reports
//!
//! Reads one report or a batch of reports, scores each on three
//! independent signals through a chat completion endpoint, and decides
//! which reports are urgent enough to publish.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, config, transport failure, etc.)
//!   2 - A report was published and --fail-on-publish was set

use anyhow::{bail, Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use report_triage::analysis::{ExecutionMode, UrgencyPipeline};
use report_triage::cli::{Args, OutputFormat};
use report_triage::config::{Config, DEFAULT_CONFIG_FILE};
use report_triage::inference::ChatCompletionClient;
use report_triage::models::{Report, ReportInput, RunMetadata, Signal, TriageEntry, TriageRun};
use report_triage::output;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Best-effort .env load so OPENROUTER_API_KEY can live there
    let _ = dotenvy::dotenv();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Logging depends on the merged config, so a broken config file is
    // reported before the subscriber exists.
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&config, args.quiet);

    info!("report-triage v{}", env!("CARGO_PKG_VERSION"));
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
    debug!("Input: {}", args.input_name());

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Triage failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .report-triage.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the model, weights and publish threshold.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity settings.
fn init_logging(config: &Config, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level(quiet).as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Run the triage workflow. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    if let Err(errors) = config.validate() {
        bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
    }

    let input = read_input(&args)?;
    let is_batch = input.is_batch();
    let reports = input.into_reports();
    info!("Loaded {} report(s) from {}", reports.len(), args.input_name());

    if args.dry_run {
        return handle_dry_run(&reports);
    }

    let aggregator = config.aggregator()?;
    let api_key = args.api_key.clone().unwrap_or_default();
    let client = ChatCompletionClient::new(config.client_config(api_key))?;
    info!("Using model {} at {}", config.model.name, client.endpoint());

    let mode = if config.general.sequential {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Concurrent
    };
    let pipeline = UrgencyPipeline::new(Arc::new(client), aggregator).with_mode(mode);

    let entries = if is_batch {
        run_batch(&pipeline, reports, config.general.concurrency, args.quiet).await
    } else {
        // A single report fails the whole run on transport errors.
        let report = reports.into_iter().next().unwrap_or_default();
        let assessment = pipeline.assess(report).await?;
        vec![TriageEntry::succeeded(0, assessment)]
    };

    let metadata = RunMetadata {
        source: args.input_name(),
        analysis_date: Utc::now(),
        model_used: pipeline.model_name().to_string(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    let run = TriageRun::new(metadata, entries);

    if run.summary.total > 0 && run.summary.failed == run.summary.total {
        bail!("All {} reports failed", run.summary.total);
    }

    let rendered = render(&run, args.format, is_batch)?;
    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write result to {}", path))?;
            info!("Result saved to {}", path);
        }
        None => println!("{}", rendered),
    }

    let summary = &run.summary;
    if !args.quiet {
        eprintln!(
            "\n📊 {} report(s): {} published, {} suppressed, {} failed ({:.1}s)",
            summary.total,
            summary.published,
            summary.suppressed,
            summary.failed,
            run.metadata.duration_seconds
        );
    }

    if args.fail_on_publish && summary.published > 0 {
        eprintln!(
            "\n⛔ {} report(s) published. Failing (exit code 2).",
            summary.published
        );
        return Ok(2);
    }

    Ok(0)
}

async fn run_batch(
    pipeline: &UrgencyPipeline,
    reports: Vec<Report>,
    concurrency: usize,
    quiet: bool,
) -> Vec<TriageEntry> {
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(reports.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    };

    let entries = pipeline
        .analyze_batch(reports, concurrency, |_| progress.inc(1))
        .await;

    progress.finish_and_clear();
    entries
}

fn render(run: &TriageRun, format: OutputFormat, is_batch: bool) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(output::generate_markdown_report(run)),
        OutputFormat::Json if is_batch => output::generate_json_report(run),
        OutputFormat::Json => match run.entries.first().and_then(|e| e.assessment.as_ref()) {
            Some(assessment) => output::generate_decision_json(&assessment.decision),
            None => bail!("No decision was produced"),
        },
    }
}

/// Handle --dry-run: print the prompts each report would produce, exit.
fn handle_dry_run(reports: &[Report]) -> Result<i32> {
    println!("🔍 Dry run: {} report(s), no model calls\n", reports.len());

    for (index, report) in reports.iter().enumerate() {
        println!("=== Report #{} ===", index);
        for signal in Signal::ALL {
            println!("--- {} ---\n{}\n", signal, signal.prompt_for(report));
        }
    }

    println!("✅ Dry run complete. No model calls were made.");
    Ok(0)
}

/// Parse the input document from a file or stdin.
fn read_input(args: &Args) -> Result<ReportInput> {
    let content = if args.reads_stdin() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read reports from stdin")?;
        buf
    } else {
        let path = args
            .input
            .as_deref()
            .context("No input file given")?;
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    };

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse reports from {}", args.input_name()))
}

/// Load configuration from `--config` or the default location.
///
/// Also returns the file the configuration came from, if any. A default
/// file that exists but does not parse is an error, not a fallback.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    let loaded = Config::load_default()
        .with_context(|| format!("Invalid {} in the working directory", DEFAULT_CONFIG_FILE))?;

    Ok(match loaded {
        Some(config) => (config, Some(PathBuf::from(DEFAULT_CONFIG_FILE))),
        None => (Config::default(), None),
    })
}
