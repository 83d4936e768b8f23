//! Data models for report triage.
//!
//! This module contains the structures that flow through the scoring
//! pipeline: the incoming report, the per-signal readings, and the
//! final publication decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// An incident report as submitted by a user.
///
/// Absent or `null` fields default to empty. Fields not known to the
/// pipeline are kept in `extra` and written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Free-form incident narrative.
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// Description of the attached image.
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_description: String,
    /// Related reports, treated as opaque records.
    #[serde(default, deserialize_with = "null_as_default")]
    pub related_reports: Vec<Value>,
    /// Any other fields present in the submitted document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Report {
    /// Creates a report from its three scored fields.
    pub fn new(
        text: impl Into<String>,
        image_description: impl Into<String>,
        related_reports: Vec<Value>,
    ) -> Self {
        Self {
            text: text.into(),
            image_description: image_description.into(),
            related_reports,
            extra: Map::new(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Input document: either one report or a batch of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReportInput {
    Batch(Vec<Report>),
    Single(Report),
}

impl ReportInput {
    /// Flattens the input into a list of reports.
    pub fn into_reports(self) -> Vec<Report> {
        match self {
            ReportInput::Batch(reports) => reports,
            ReportInput::Single(report) => vec![report],
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, ReportInput::Batch(_))
    }
}

/// One of the independent urgency indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Hazard indicators in the image description.
    Visual,
    /// Density of related reports.
    ClusterDensity,
    /// Urgency of the narrative text.
    Sentiment,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Visual, Signal::ClusterDensity, Signal::Sentiment];
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Visual => write!(f, "Visual"),
            Signal::ClusterDensity => write!(f, "Cluster Density"),
            Signal::Sentiment => write!(f, "Sentiment"),
        }
    }
}

/// A score in `[0, 1]`.
///
/// The only way in is [`NormalizedScore::new`], which clamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct NormalizedScore(f64);

impl NormalizedScore {
    pub const MIN: NormalizedScore = NormalizedScore(0.0);
    pub const MAX: NormalizedScore = NormalizedScore(1.0);

    /// Clamps `value` into `[0, 1]`. `NaN` collapses to 0.0.
    pub fn new(value: f64) -> Self {
        // f64::max returns the non-NaN operand, f64::clamp would not.
        Self(value.max(0.0).min(1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// The score one analyzer produced for a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalReading {
    pub signal: Signal,
    pub score: NormalizedScore,
    /// False when the model reply was not a number and the score fell back to 0.0.
    pub parsed: bool,
}

/// Intermediate values behind a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalBreakdown {
    pub visual: SignalReading,
    pub cluster: SignalReading,
    pub sentiment: SignalReading,
    /// Convex combination of the three scores.
    pub weighted: f64,
    /// Value on the 1-10 scale before the publication gate.
    pub scaled: u8,
}

impl SignalBreakdown {
    pub fn readings(&self) -> [&SignalReading; 3] {
        [&self.visual, &self.cluster, &self.sentiment]
    }

    /// Number of readings that fell back because the reply was unparseable.
    pub fn fallback_count(&self) -> usize {
        self.readings().iter().filter(|r| !r.parsed).count()
    }
}

/// Publication decision for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityDecision {
    /// 0 when suppressed, otherwise the severity on the 1-10 scale.
    pub urgency_score: u8,
    pub show_on_forum: bool,
    pub original_report: Report,
}

impl SeverityDecision {
    /// Sentinel for reports below the publication threshold.
    pub const SUPPRESSED: u8 = 0;

    /// Builds a decision from a gated score.
    pub fn from_gated(urgency_score: u8, original_report: Report) -> Self {
        Self {
            urgency_score,
            show_on_forum: urgency_score != Self::SUPPRESSED,
            original_report,
        }
    }

    pub fn band(&self) -> UrgencyBand {
        UrgencyBand::from_score(self.urgency_score)
    }
}

/// Coarse grouping of urgency scores for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyBand {
    Suppressed,
    Moderate,
    High,
    Critical,
}

impl UrgencyBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0 => UrgencyBand::Suppressed,
            1..=5 => UrgencyBand::Moderate,
            6..=8 => UrgencyBand::High,
            _ => UrgencyBand::Critical,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            UrgencyBand::Suppressed => "⚪",
            UrgencyBand::Moderate => "🟡",
            UrgencyBand::High => "🟠",
            UrgencyBand::Critical => "🔴",
        }
    }
}

impl fmt::Display for UrgencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyBand::Suppressed => write!(f, "Suppressed"),
            UrgencyBand::Moderate => write!(f, "Moderate"),
            UrgencyBand::High => write!(f, "High"),
            UrgencyBand::Critical => write!(f, "Critical"),
        }
    }
}

/// A decision together with the signals that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub decision: SeverityDecision,
    pub signals: SignalBreakdown,
}

/// Outcome for one report of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct TriageEntry {
    /// Position of the report in the input document.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<Assessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TriageEntry {
    pub fn succeeded(index: usize, assessment: Assessment) -> Self {
        Self {
            index,
            assessment: Some(assessment),
            error: None,
        }
    }

    pub fn failed(index: usize, error: String) -> Self {
        Self {
            index,
            assessment: None,
            error: Some(error),
        }
    }
}

/// Counts over a triage run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TriageSummary {
    pub total: usize,
    pub published: usize,
    pub suppressed: usize,
    pub failed: usize,
    /// Readings that fell back to 0.0 on an unparseable reply.
    pub parse_fallbacks: usize,
}

impl TriageSummary {
    pub fn from_entries(entries: &[TriageEntry]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            ..Self::default()
        };

        for entry in entries {
            match &entry.assessment {
                Some(assessment) => {
                    if assessment.decision.show_on_forum {
                        summary.published += 1;
                    } else {
                        summary.suppressed += 1;
                    }
                    summary.parse_fallbacks += assessment.signals.fallback_count();
                }
                None => summary.failed += 1,
            }
        }

        summary
    }
}

/// Metadata about a triage run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    /// Where the reports were read from.
    pub source: String,
    pub analysis_date: DateTime<Utc>,
    pub model_used: String,
    pub duration_seconds: f64,
}

/// The complete result of a triage run.
#[derive(Debug, Clone, Serialize)]
pub struct TriageRun {
    pub metadata: RunMetadata,
    pub summary: TriageSummary,
    pub entries: Vec<TriageEntry>,
}

impl TriageRun {
    pub fn new(metadata: RunMetadata, entries: Vec<TriageEntry>) -> Self {
        Self {
            metadata,
            summary: TriageSummary::from_entries(&entries),
            entries,
        }
    }
}
