//! Urgency scoring for incident reports.
//!
//! A report is scored on three signals by a text completion service,
//! the scores are combined with fixed weights onto a 1-10 scale, and
//! reports below the publication threshold are suppressed.
//!
//! ```no_run
//! use std::sync::Arc;
//! use report_triage::analysis::{Aggregator, UrgencyPipeline};
//! use report_triage::inference::{ChatCompletionClient, ClientConfig};
//! use report_triage::models::Report;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let client = ChatCompletionClient::new(ClientConfig {
//!     api_key: std::env::var("OPENROUTER_API_KEY")?,
//!     ..ClientConfig::default()
//! })?;
//! let pipeline = UrgencyPipeline::new(Arc::new(client), Aggregator::default());
//!
//! let decision = pipeline
//!     .analyze(Report::new("Smoke pouring out of the lift shaft", "", vec![]))
//!     .await?;
//! println!("{} {}", decision.urgency_score, decision.show_on_forum);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod inference;
pub mod models;
pub mod output;
