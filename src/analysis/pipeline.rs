//! Report triage pipeline.
//!
//! Runs the three signal analyzers over a report, aggregates their
//! scores and packages the publication decision.

use crate::analysis::aggregator::Aggregator;
use crate::analysis::signals::{analyze_cluster_density, analyze_sentiment, analyze_visual};
use crate::inference::{CompletionProvider, InferenceError};
use crate::models::{Assessment, Report, SeverityDecision, TriageEntry};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the three analyzer calls for one report are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// All three requests in flight at once.
    #[default]
    Concurrent,
    /// Visual, then cluster density, then sentiment.
    Sequential,
}

/// Scores reports and decides whether they are published.
#[derive(Clone)]
pub struct UrgencyPipeline {
    provider: Arc<dyn CompletionProvider>,
    aggregator: Aggregator,
    mode: ExecutionMode,
}

impl UrgencyPipeline {
    pub fn new(provider: Arc<dyn CompletionProvider>, aggregator: Aggregator) -> Self {
        Self {
            provider,
            aggregator,
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Decides whether `report` should be shown on the forum.
    ///
    /// Any transport failure aborts the run; unparseable model replies
    /// have already been scored as 0.0 by the analyzers.
    pub async fn analyze(&self, report: Report) -> Result<SeverityDecision, InferenceError> {
        Ok(self.assess(report).await?.decision)
    }

    /// Like [`UrgencyPipeline::analyze`], keeping the per-signal breakdown.
    pub async fn assess(&self, report: Report) -> Result<Assessment, InferenceError> {
        let provider = self.provider.as_ref();

        let (visual, cluster, sentiment) = match self.mode {
            ExecutionMode::Concurrent => tokio::try_join!(
                analyze_visual(provider, &report),
                analyze_cluster_density(provider, &report),
                analyze_sentiment(provider, &report),
            )?,
            ExecutionMode::Sequential => {
                let visual = analyze_visual(provider, &report).await?;
                let cluster = analyze_cluster_density(provider, &report).await?;
                let sentiment = analyze_sentiment(provider, &report).await?;
                (visual, cluster, sentiment)
            }
        };

        let (urgency_score, signals) = self.aggregator.combine(visual, cluster, sentiment);
        debug!(
            "weighted {:.3} -> scaled {} -> gated {}",
            signals.weighted, signals.scaled, urgency_score
        );

        let decision = SeverityDecision::from_gated(urgency_score, report);
        info!(
            "Urgency {} ({})",
            decision.urgency_score,
            if decision.show_on_forum {
                "published"
            } else {
                "suppressed"
            }
        );

        Ok(Assessment { decision, signals })
    }

    /// Assesses many reports with at most `concurrency` in flight.
    ///
    /// Entries come back in input order. A failed report is recorded as
    /// such and does not stop the others. `on_complete` is called as
    /// each report finishes.
    pub async fn analyze_batch<F>(
        &self,
        reports: Vec<Report>,
        concurrency: usize,
        mut on_complete: F,
    ) -> Vec<TriageEntry>
    where
        F: FnMut(&TriageEntry),
    {
        info!(
            "Assessing {} reports ({} at a time)",
            reports.len(),
            concurrency.max(1)
        );

        let mut entries: Vec<TriageEntry> = stream::iter(reports.into_iter().enumerate())
            .map(|(index, report)| async move {
                match self.assess(report).await {
                    Ok(assessment) => TriageEntry::succeeded(index, assessment),
                    Err(e) => {
                        warn!("Report {} failed: {}", index, e);
                        TriageEntry::failed(index, e.to_string())
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .inspect(|entry| on_complete(entry))
            .collect()
            .await;

        entries.sort_by_key(|e| e.index);
        entries
    }
}
