//! Signal analyzers.
//!
//! Each analyzer embeds one field of the report in an instruction,
//! asks the completion provider for a rating, and turns the reply into
//! a [`NormalizedScore`]. Unparseable replies score 0.0; transport
//! failures are returned to the caller.

use crate::inference::{CompletionProvider, InferenceError};
use crate::models::{NormalizedScore, Report, Signal, SignalReading};
use serde_json::Value;
use tracing::debug;

const VISUAL_PROMPT: &str = "Analyze the following image description for emergency-related visual elements:
{input}

Rate the emergency level from 0 to 1 based on:
- Presence of dangerous situations
- Visual indicators of urgency
- Environmental hazards
Return only the numerical score.";

const CLUSTER_PROMPT: &str = "Analyze the following cluster of related reports:
{input}

Calculate a density score from 0 to 1 based on:
- Number of related reports
- Temporal proximity
- Geographic proximity
Return only the numerical score.";

const SENTIMENT_PROMPT: &str = "Analyze the following report text for sentiment and urgency:
{input}

Rate the urgency level from 0 to 1 based on:
- Emotional intensity
- Use of urgent language
- Described severity
Return only the numerical score.";

impl Signal {
    fn template(&self) -> &'static str {
        match self {
            Signal::Visual => VISUAL_PROMPT,
            Signal::ClusterDensity => CLUSTER_PROMPT,
            Signal::Sentiment => SENTIMENT_PROMPT,
        }
    }

    /// The report field this signal reads, rendered for the prompt.
    pub fn input_from(&self, report: &Report) -> String {
        match self {
            Signal::Visual => report.image_description.clone(),
            Signal::ClusterDensity => serialize_related(&report.related_reports),
            Signal::Sentiment => report.text.clone(),
        }
    }

    /// Builds the full instruction sent to the model.
    pub fn prompt_for(&self, report: &Report) -> String {
        self.template().replace("{input}", &self.input_from(report))
    }
}

fn serialize_related(related: &[Value]) -> String {
    serde_json::to_string(related).unwrap_or_else(|_| "[]".to_string())
}

/// Parses a model reply into a score.
///
/// Returns the clamped score and whether the reply was a number.
pub fn parse_score(reply: &str) -> (NormalizedScore, bool) {
    match reply.trim().parse::<f64>() {
        Ok(value) if !value.is_nan() => (NormalizedScore::new(value), true),
        _ => (NormalizedScore::MIN, false),
    }
}

/// Runs one analyzer against a report.
pub async fn analyze_signal(
    provider: &dyn CompletionProvider,
    signal: Signal,
    report: &Report,
) -> Result<SignalReading, InferenceError> {
    let prompt = signal.prompt_for(report);
    debug!("{} prompt:\n{}", signal, prompt);

    let reply = provider.complete(&prompt).await?;
    let (score, parsed) = parse_score(&reply);

    if parsed {
        debug!("{} score: {:.3}", signal, score.value());
    } else {
        debug!("{} reply was not a number, scoring 0.0: {:?}", signal, reply);
    }

    Ok(SignalReading {
        signal,
        score,
        parsed,
    })
}

/// Rates hazard indicators in the image description.
pub async fn analyze_visual(
    provider: &dyn CompletionProvider,
    report: &Report,
) -> Result<SignalReading, InferenceError> {
    analyze_signal(provider, Signal::Visual, report).await
}

/// Rates how densely related reports cluster in time and space.
pub async fn analyze_cluster_density(
    provider: &dyn CompletionProvider,
    report: &Report,
) -> Result<SignalReading, InferenceError> {
    analyze_signal(provider, Signal::ClusterDensity, report).await
}

/// Rates urgency expressed in the narrative text.
pub async fn analyze_sentiment(
    provider: &dyn CompletionProvider,
    report: &Report,
) -> Result<SignalReading, InferenceError> {
    analyze_signal(provider, Signal::Sentiment, report).await
}
