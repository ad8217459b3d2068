//! Numeric sentiment scores for downstream analysis.

use crate::types::SentimentLabel;

/// Score assigned to any label outside the known set.
pub const NEUTRAL_SCORE: f64 = 0.5;

impl SentimentLabel {
    pub fn score(&self) -> f64 {
        match self {
            SentimentLabel::Negative => 0.0,
            SentimentLabel::Neutral => NEUTRAL_SCORE,
            SentimentLabel::Positive => 1.0,
        }
    }
}

/// Map a label string to its score. Unrecognised labels score as neutral.
pub fn to_score(label: &str) -> f64 {
    label
        .parse::<SentimentLabel>()
        .map(|l| l.score())
        .unwrap_or(NEUTRAL_SCORE)
}
