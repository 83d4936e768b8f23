//! Command-line arguments.
//!
//! Every flag that mirrors a config file setting is optional here so that
//! an unset flag leaves the file value alone.

use clap::Parser;
use std::path::PathBuf;

/// report-triage - LLM-backed urgency scoring for incident reports
///
/// Scores each report on three signals (image description, related
/// reports, narrative text), combines them into a 1-10 urgency and
/// decides whether the report is shown on the forum.
///
/// Examples:
///   report-triage --input report.json
///   report-triage --input reports.json --format markdown --output triage.md
///   cat report.json | report-triage --input - --sequential
///   report-triage --input reports.json --dry-run
///   report-triage --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file with one report or an array of reports ("-" for stdin)
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// API key for the inference endpoint
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier
    ///
    /// Overrides `model.name` from the config file.
    #[arg(short, long, env = "REPORT_TRIAGE_MODEL")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, value_name = "URL", env = "OPENROUTER_BASE_URL")]
    pub base_url: Option<String>,

    /// Value for the HTTP-Referer header (empty to omit it)
    #[arg(long, value_name = "URL")]
    pub referer: Option<String>,

    /// Write the result to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .report-triage.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no progress bar)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of reports assessed at the same time
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Issue the three signal requests one after another
    #[arg(long)]
    pub sequential: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Sampling temperature sent with each request
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Maximum tokens in each reply
    #[arg(long, value_name = "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Minimum urgency (3-10) for a report to be published
    #[arg(long, value_name = "SCORE")]
    pub publish_threshold: Option<u8>,

    /// Print the prompts each report would produce without calling the model
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any report is published
    ///
    /// Useful for alerting jobs.
    #[arg(long)]
    pub fail_on_publish: bool,

    /// Generate a default .report-triage.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown format
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when reports are read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.input
            .as_deref()
            .map(|p| p.as_os_str() == "-")
            .unwrap_or(false)
    }

    /// Human-readable name of the input, for run metadata.
    pub fn input_name(&self) -> String {
        match self.input {
            Some(_) if self.reads_stdin() => "<stdin>".to_string(),
            Some(ref path) => path.display().to_string(),
            None => String::new(),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref input) = self.input {
            if !self.reads_stdin() && !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        // The key is not needed when nothing is sent
        if !self.dry_run && self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(
                "An API key is required: set OPENROUTER_API_KEY or pass --api-key".to_string(),
            );
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: Some(PathBuf::from("-")),
            api_key: Some("sk-test".to_string()),
            model: None,
            base_url: None,
            referer: None,
            output: None,
            format: OutputFormat::Json,
            config: None,
            verbose: false,
            quiet: false,
            concurrency: None,
            sequential: false,
            timeout: None,
            temperature: None,
            max_tokens: None,
            publish_threshold: None,
            dry_run: false,
            fail_on_publish: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_minimal() {
        let args = Args::try_parse_from([
            "report-triage",
            "--input",
            "reports.json",
            "--format",
            "markdown",
        ])
        .unwrap();
        assert_eq!(args.input, Some(PathBuf::from("reports.json")));
        assert_eq!(args.format, OutputFormat::Markdown);
        assert!(!args.sequential);
    }

    #[test]
    fn test_input_required_unless_init_config() {
        assert!(Args::try_parse_from(["report-triage"]).is_err());
        assert!(Args::try_parse_from(["report-triage", "--init-config"]).is_ok());
    }

    #[test]
    fn test_stdin_input() {
        let args = make_args();
        assert!(args.reads_stdin());
        assert_eq!(args.input_name(), "<stdin>");
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input_file() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_api_key_unless_dry_run() {
        let mut args = make_args();
        args.api_key = None;
        assert!(args.validate().is_err());

        args.api_key = Some(String::new());
        assert!(args.validate().is_err());

        args.dry_run = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }
}
