//! Configuration file handling.
//!
//! This module handles loading, validating and merging configuration
//! from `.report-triage.toml` files.

use crate::analysis::{Aggregator, ScoringError, SeverityScale, WeightSet};
use crate::inference::ClientConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = ".report-triage.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Inference endpoint settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Weights and threshold.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write results here instead of stdout.
    #[serde(default)]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Reports assessed at the same time in a batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Issue the three signal requests one after another.
    #[serde(default)]
    pub sequential: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            verbose: false,
            concurrency: default_concurrency(),
            sequential: false,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Chat completion endpoint settings.
///
/// The API key is deliberately absent; it only comes from the
/// environment or the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value for the `HTTP-Referer` header.
    #[serde(default = "default_referer")]
    pub referer: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Sampling temperature; provider default when unset.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens in the reply; provider default when unset.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            base_url: default_base_url(),
            referer: default_referer(),
            timeout_seconds: default_timeout(),
            temperature: None,
            max_tokens: None,
        }
    }
}

fn default_model() -> String {
    "anthropic/claude-3-opus-20240229".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_referer() -> Option<String> {
    Some("https://alarmsus.com".to_string())
}

fn default_timeout() -> u64 {
    30
}

/// Signal weights and publication threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum score on the 1-10 scale for a report to be published.
    #[serde(default = "default_publish_threshold")]
    pub publish_threshold: u8,

    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            publish_threshold: default_publish_threshold(),
            weights: WeightsConfig::default(),
        }
    }
}

fn default_publish_threshold() -> u8 {
    3
}

/// Raw weights as written in the file. Checked by [`Config::validate`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub visual: f64,
    pub cluster: f64,
    pub sentiment: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        let weights = WeightSet::default();
        Self {
            visual: weights.visual(),
            cluster: weights.cluster(),
            sentiment: weights.sentiment(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.report-triage.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only arguments given explicitly (or through their environment
    /// variable) override file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = base_url.clone();
        }
        if let Some(ref referer) = args.referer {
            self.model.referer = Some(referer.clone()).filter(|r| !r.is_empty());
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = Some(temperature);
        }
        if let Some(max_tokens) = args.max_tokens {
            self.model.max_tokens = Some(max_tokens);
        }
        if let Some(threshold) = args.publish_threshold {
            self.scoring.publish_threshold = threshold;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        // Flags only ever switch on
        if args.sequential {
            self.general.sequential = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let w = &self.scoring.weights;
        for err in WeightSet::validate(w.visual, w.cluster, w.sentiment) {
            errors.push(format!("scoring.weights: {}", err));
        }

        if let Err(err) = SeverityScale::new(self.scoring.publish_threshold) {
            errors.push(format!("scoring.publish_threshold: {}", err));
        }

        if self.model.name.trim().is_empty() {
            errors.push("model.name: must not be empty".to_string());
        }

        if !self.model.base_url.starts_with("http://") && !self.model.base_url.starts_with("https://")
        {
            errors.push(format!(
                "model.base_url: must start with 'http://' or 'https://', got '{}'",
                self.model.base_url
            ));
        }

        if self.model.timeout_seconds == 0 {
            errors.push("model.timeout_seconds: must be at least 1".to_string());
        }

        if let Some(temperature) = self.model.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                errors.push(format!(
                    "model.temperature: must be between 0.0 and 2.0, got {}",
                    temperature
                ));
            }
        }

        if self.general.concurrency == 0 {
            errors.push("general.concurrency: must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Log level for the run. `--quiet` wins over `verbose` from either
    /// the file or the command line.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Build the aggregator described by `[scoring]`.
    pub fn aggregator(&self) -> Result<Aggregator, ScoringError> {
        let w = &self.scoring.weights;
        let weights = WeightSet::new(w.visual, w.cluster, w.sentiment)?;
        let scale = SeverityScale::new(self.scoring.publish_threshold)?;
        Ok(Aggregator::new(weights, scale))
    }

    /// Build the transport settings for the given API key.
    pub fn client_config(&self, api_key: String) -> ClientConfig {
        ClientConfig {
            base_url: self.model.base_url.clone(),
            api_key,
            model: self.model.name.clone(),
            referer: self.model.referer.clone(),
            timeout_seconds: self.model.timeout_seconds,
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "anthropic/claude-3-opus-20240229");
        assert_eq!(config.model.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.model.timeout_seconds, 30);
        assert_eq!(config.scoring.publish_threshold, 3);
        assert_eq!(config.general.concurrency, 4);
        assert!(config.validate().is_ok());
        assert_eq!(config.aggregator().unwrap(), Aggregator::default());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
sequential = true

[model]
name = "openai/gpt-4o-mini"
temperature = 0.2
timeout_seconds = 10

[scoring]
publish_threshold = 5

[scoring.weights]
visual = 0.5
cluster = 0.25
sentiment = 0.25
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert!(config.general.sequential);
        assert_eq!(config.model.name, "openai/gpt-4o-mini");
        assert_eq!(config.model.temperature, Some(0.2));
        assert_eq!(config.model.timeout_seconds, 10);
        assert_eq!(config.model.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.scoring.publish_threshold, 5);
        assert_eq!(config.scoring.weights.visual, 0.5);
        assert!(config.validate().is_ok());

        let aggregator = config.aggregator().unwrap();
        assert_eq!(aggregator.scale().publish_threshold(), 5);
        assert_eq!(aggregator.weights().visual(), 0.5);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.scoring.weights = WeightsConfig {
            visual: 0.6,
            cluster: 0.3,
            sentiment: 0.3,
        };
        config.scoring.publish_threshold = 0;
        config.model.base_url = "openrouter.ai".to_string();
        config.general.concurrency = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].starts_with("scoring.weights: weights must sum to 1.0"));
        assert!(errors[1].starts_with("scoring.publish_threshold"));
        assert!(errors.iter().any(|e| e.starts_with("model.base_url")));
        assert!(errors.iter().any(|e| e.starts_with("general.concurrency")));

        assert!(matches!(
            config.aggregator(),
            Err(ScoringError::WeightSum(_))
        ));
    }

    #[test]
    fn test_validate_rejects_threshold_below_three() {
        let mut config = Config::default();
        config.scoring.publish_threshold = 2;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("[3, 10]"));
        assert!(config.aggregator().is_err());
    }

    #[test]
    fn test_log_level_honours_file_verbose() {
        let mut config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(config.log_level(false), tracing::Level::DEBUG);
        assert_eq!(config.log_level(true), tracing::Level::ERROR);

        config.general.verbose = false;
        assert_eq!(config.log_level(false), tracing::Level::INFO);

        let args = Args::try_parse_from(["report-triage", "--input", "r.json", "--verbose"]).unwrap();
        config.merge_with_args(&args);
        assert_eq!(config.log_level(args.quiet), tracing::Level::DEBUG);
    }

    #[test]
    fn test_load_from_dir_reports_malformed_default_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            "[scoring]\npublish_threshold = \"high\"\n",
        )
        .unwrap();

        assert!(Config::load_from_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[scoring.weights]"));
        assert!(!toml_str.contains("api_key"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            "[model]\nname = \"meta-llama/llama-3-70b\"\n",
        )
        .unwrap();

        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.model.name, "meta-llama/llama-3-70b");
        assert_eq!(config.scoring.publish_threshold, 3);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[scoring\npublish_threshold = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_merge_with_args_only_overrides_given_values() {
        let args = Args::try_parse_from([
            "report-triage",
            "--input",
            "reports.json",
            "--model",
            "openai/gpt-4o",
            "--timeout",
            "90",
            "--sequential",
        ])
        .unwrap();

        let mut config = Config::default();
        config.model.base_url = "https://llm.internal/v1".to_string();
        config.merge_with_args(&args);

        assert_eq!(config.model.name, "openai/gpt-4o");
        assert_eq!(config.model.timeout_seconds, 90);
        assert_eq!(config.model.base_url, "https://llm.internal/v1");
        assert!(config.general.sequential);
        assert_eq!(config.general.concurrency, 4);
    }

    #[test]
    fn test_client_config() {
        let config = Config::default();
        let client = config.client_config("sk-test".to_string());
        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.model, config.model.name);
        assert_eq!(client.referer.as_deref(), Some("https://alarmsus.com"));
    }
}
