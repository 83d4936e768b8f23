//! Weighted aggregation of signal scores.
//!
//! Combines the three normalized signals into one weighted score,
//! rescales it onto the 1-10 severity scale and applies the
//! publication gate.

use crate::models::{NormalizedScore, SignalBreakdown, SignalReading};
use serde::Serialize;
use thiserror::Error;

/// Tolerance for the sum-to-one check on weights.
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Invalid scoring parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("weight `{name}` must be within [0, 1], got {value}")]
    WeightOutOfRange { name: &'static str, value: f64 },

    #[error("weights must sum to 1.0, got {0}")]
    WeightSum(f64),

    #[error("publish threshold must be within [{min}, {max}], got {threshold}")]
    Threshold { threshold: u8, min: u8, max: u8 },
}

/// Per-signal weights. Always within `[0, 1]` and summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSet {
    visual: f64,
    cluster: f64,
    sentiment: f64,
}

impl Default for WeightSet {
    fn default() -> Self {
        Self {
            visual: 0.4,
            cluster: 0.3,
            sentiment: 0.3,
        }
    }
}

impl WeightSet {
    pub fn new(visual: f64, cluster: f64, sentiment: f64) -> Result<Self, ScoringError> {
        match Self::validate(visual, cluster, sentiment).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(Self {
                visual,
                cluster,
                sentiment,
            }),
        }
    }

    /// Returns every problem with the given weights.
    pub fn validate(visual: f64, cluster: f64, sentiment: f64) -> Vec<ScoringError> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("visual", visual),
            ("cluster", cluster),
            ("sentiment", sentiment),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(ScoringError::WeightOutOfRange { name, value });
            }
        }

        let sum = visual + cluster + sentiment;
        if !((sum - 1.0).abs() <= WEIGHT_SUM_EPSILON) {
            errors.push(ScoringError::WeightSum(sum));
        }

        errors
    }

    pub fn visual(&self) -> f64 {
        self.visual
    }

    pub fn cluster(&self) -> f64 {
        self.cluster
    }

    pub fn sentiment(&self) -> f64 {
        self.sentiment
    }

    pub fn sum(&self) -> f64 {
        self.visual + self.cluster + self.sentiment
    }
}

/// Integer severity scale and the publication threshold on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeverityScale {
    min: u8,
    max: u8,
    publish_threshold: u8,
}

impl Default for SeverityScale {
    fn default() -> Self {
        Self {
            min: Self::MIN,
            max: Self::MAX,
            publish_threshold: Self::MIN_PUBLISH_THRESHOLD,
        }
    }
}

impl SeverityScale {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;
    /// Published scores are never below this, so a 1 or 2 cannot reach the forum.
    pub const MIN_PUBLISH_THRESHOLD: u8 = 3;

    /// A 1-10 scale with the given publication threshold (3-10).
    pub fn new(publish_threshold: u8) -> Result<Self, ScoringError> {
        if !(Self::MIN_PUBLISH_THRESHOLD..=Self::MAX).contains(&publish_threshold) {
            return Err(ScoringError::Threshold {
                threshold: publish_threshold,
                min: Self::MIN_PUBLISH_THRESHOLD,
                max: Self::MAX,
            });
        }

        Ok(Self {
            publish_threshold,
            ..Self::default()
        })
    }

    pub fn publish_threshold(&self) -> u8 {
        self.publish_threshold
    }

    /// Maps `[0, 1]` linearly onto `[min, max]`, rounding half away from zero.
    pub fn rescale(&self, weighted: f64) -> u8 {
        let span = f64::from(self.max - self.min);
        let scaled = (weighted * span + f64::from(self.min)).round();
        scaled.max(f64::from(self.min)).min(f64::from(self.max)) as u8
    }

    /// Scores below the threshold become the suppressed sentinel 0.
    pub fn gate(&self, scaled: u8) -> u8 {
        if scaled < self.publish_threshold {
            0
        } else {
            scaled
        }
    }
}

/// Turns three signal scores into a gated urgency score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregator {
    weights: WeightSet,
    scale: SeverityScale,
}

impl Aggregator {
    pub fn new(weights: WeightSet, scale: SeverityScale) -> Self {
        Self { weights, scale }
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    pub fn scale(&self) -> &SeverityScale {
        &self.scale
    }

    /// Convex combination of the three scores.
    pub fn weighted(
        &self,
        visual: NormalizedScore,
        cluster: NormalizedScore,
        sentiment: NormalizedScore,
    ) -> f64 {
        let raw = visual.value() * self.weights.visual
            + cluster.value() * self.weights.cluster
            + sentiment.value() * self.weights.sentiment;

        // Float drift can land a hair outside [0, 1].
        raw.max(0.0).min(1.0)
    }

    /// Gated urgency score: 0 or a value in `[threshold, 10]`.
    pub fn score(
        &self,
        visual: NormalizedScore,
        cluster: NormalizedScore,
        sentiment: NormalizedScore,
    ) -> u8 {
        let weighted = self.weighted(visual, cluster, sentiment);
        self.scale.gate(self.scale.rescale(weighted))
    }

    /// Like [`Aggregator::score`], also returning the intermediate values.
    pub fn combine(
        &self,
        visual: SignalReading,
        cluster: SignalReading,
        sentiment: SignalReading,
    ) -> (u8, SignalBreakdown) {
        let weighted = self.weighted(visual.score, cluster.score, sentiment.score);
        let scaled = self.scale.rescale(weighted);
        let gated = self.scale.gate(scaled);

        let breakdown = SignalBreakdown {
            visual,
            cluster,
            sentiment,
            weighted,
            scaled,
        };

        (gated, breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Signal;

    fn s(value: f64) -> NormalizedScore {
        NormalizedScore::new(value)
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = WeightSet::default();
        assert!((weights.sum() - 1.0).abs() <= WEIGHT_SUM_EPSILON);
        assert_eq!(weights.visual(), 0.4);
        assert_eq!(weights.cluster(), 0.3);
        assert_eq!(weights.sentiment(), 0.3);
    }

    #[test]
    fn test_weight_set_rejects_bad_sum() {
        assert_eq!(
            WeightSet::new(0.5, 0.3, 0.3),
            Err(ScoringError::WeightSum(0.5 + 0.3 + 0.3))
        );
        assert!(WeightSet::new(0.2, 0.2, 0.2).is_err());
        assert!(WeightSet::new(1.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_weight_set_rejects_out_of_range() {
        let errors = WeightSet::validate(1.5, -0.5, 0.0);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors[0],
            ScoringError::WeightOutOfRange { name: "visual", .. }
        ));
        assert!(matches!(
            errors[1],
            ScoringError::WeightOutOfRange { name: "cluster", .. }
        ));

        assert!(WeightSet::new(f64::NAN, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_weighted_is_within_unit_interval() {
        let aggregator = Aggregator::default();
        let steps = [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0];

        for v in steps {
            for c in steps {
                for t in steps {
                    let w = aggregator.weighted(s(v), s(c), s(t));
                    assert!((0.0..=1.0).contains(&w), "weighted {w} for ({v}, {c}, {t})");
                }
            }
        }
    }

    #[test]
    fn test_rescale_endpoints_and_range() {
        let scale = SeverityScale::default();
        assert_eq!(scale.rescale(0.0), 1);
        assert_eq!(scale.rescale(1.0), 10);

        for i in 0..=1000 {
            let w = f64::from(i) / 1000.0;
            let scaled = scale.rescale(w);
            assert!((1..=10).contains(&scaled), "rescale({w}) = {scaled}");
        }
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        // 0.5 * 9 + 1 = 5.5
        assert_eq!(SeverityScale::default().rescale(0.5), 6);
    }

    #[test]
    fn test_gate_boundary() {
        let scale = SeverityScale::default();
        assert_eq!(scale.gate(1), 0);
        assert_eq!(scale.gate(2), 0);
        assert_eq!(scale.gate(3), 3);
        assert_eq!(scale.gate(4), 4);
        assert_eq!(scale.gate(10), 10);
    }

    #[test]
    fn test_custom_threshold() {
        let scale = SeverityScale::new(6).unwrap();
        assert_eq!(scale.gate(5), 0);
        assert_eq!(scale.gate(6), 6);

        assert!(SeverityScale::new(0).is_err());
        assert!(SeverityScale::new(11).is_err());
        assert!(SeverityScale::new(3).is_ok());
        assert!(SeverityScale::new(10).is_ok());
    }

    #[test]
    fn test_threshold_below_three_is_rejected() {
        for threshold in [1, 2] {
            assert_eq!(
                SeverityScale::new(threshold),
                Err(ScoringError::Threshold {
                    threshold,
                    min: 3,
                    max: 10,
                })
            );
        }
    }

    #[test]
    fn test_published_scores_are_never_below_three() {
        for threshold in 3..=10 {
            let scale = SeverityScale::new(threshold).unwrap();
            let aggregator = Aggregator::new(WeightSet::default(), scale);
            for step in 0..=100 {
                let v = f64::from(step) / 100.0;
                let score = aggregator.score(s(v), s(v), s(v));
                assert!(score == 0 || (threshold..=10).contains(&score));
            }
        }
    }

    #[test]
    fn test_score_all_max() {
        assert_eq!(Aggregator::default().score(s(1.0), s(1.0), s(1.0)), 10);
    }

    #[test]
    fn test_score_all_zero_is_suppressed() {
        let aggregator = Aggregator::default();
        assert_eq!(aggregator.weighted(s(0.0), s(0.0), s(0.0)), 0.0);
        assert_eq!(aggregator.score(s(0.0), s(0.0), s(0.0)), 0);
    }

    #[test]
    fn test_score_threshold_boundary() {
        let aggregator = Aggregator::default();
        let weighted = aggregator.weighted(s(0.3), s(0.2), s(0.2));
        assert!((weighted - 0.24).abs() < 1e-12);
        assert_eq!(aggregator.score(s(0.3), s(0.2), s(0.2)), 3);
    }

    #[test]
    fn test_combine_reports_breakdown() {
        let reading = |signal, value| SignalReading {
            signal,
            score: s(value),
            parsed: true,
        };

        let (score, breakdown) = Aggregator::default().combine(
            reading(Signal::Visual, 0.0),
            reading(Signal::ClusterDensity, 0.1),
            reading(Signal::Sentiment, 0.0),
        );

        // 0.03 * 9 + 1 = 1.27 -> 1 -> suppressed
        assert_eq!(breakdown.scaled, 1);
        assert_eq!(score, 0);
        assert_eq!(breakdown.cluster.signal, Signal::ClusterDensity);
    }
}
