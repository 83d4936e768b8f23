//! Urgency analysis.
//!
//! Signal analyzers, the weighted aggregator, and the pipeline that
//! ties them together.

pub mod aggregator;
pub mod pipeline;
pub mod signals;

pub use aggregator::{Aggregator, ScoringError, SeverityScale, WeightSet};
pub use pipeline::{ExecutionMode, UrgencyPipeline};
