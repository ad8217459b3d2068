//! Deterministic stand-in for the neural classifier.

use crate::SentimentClassifier;
use std::sync::Mutex;
use stocksent_core::{ModelError, Probabilities};

const POSITIVE_WORDS: &[&str] = &["profit", "profits", "soar", "beat", "record", "bullish"];
const NEGATIVE_WORDS: &[&str] = &["crash", "lawsuit", "loss", "miss", "bearish", "recall"];

/// Scores text by counting finance keywords.
///
/// Any chunk containing [`KeywordClassifier::MALFORMED`] fails to tokenize as
/// a whole. A classifier built with [`KeywordClassifier::failing`] fails
/// inference on every call, and [`KeywordClassifier::failing_on`] on chunks
/// containing the given word. Chunk sizes of all calls are recorded.
#[derive(Debug, Default)]
pub struct KeywordClassifier {
    always_fail: bool,
    fail_on: Option<String>,
    batch_size: Option<usize>,
    calls: Mutex<Vec<usize>>,
}

impl KeywordClassifier {
    pub const MALFORMED: &'static str = "__malformed__";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, word: &str) -> Self {
        self.fail_on = Some(word.to_string());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Total number of texts sent to the classifier.
    pub fn texts_scored(&self) -> usize {
        self.chunk_sizes().iter().sum()
    }

    fn score(text: &str) -> Probabilities {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let pos = words.iter().filter(|w| POSITIVE_WORDS.contains(w)).count();
        let neg = words.iter().filter(|w| NEGATIVE_WORDS.contains(w)).count();

        if pos > neg {
            Probabilities([0.1, 0.2, 0.7])
        } else if neg > pos {
            Probabilities([0.7, 0.2, 0.1])
        } else {
            Probabilities([0.15, 0.7, 0.15])
        }
    }
}

impl SentimentClassifier for KeywordClassifier {
    fn classify_chunk(&self, texts: &[&str]) -> Result<Vec<Probabilities>, ModelError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(texts.len());
        }
        if texts.iter().any(|t| t.contains(Self::MALFORMED)) {
            return Err(ModelError::TokenizationFailed {
                reason: "keyword classifier rejected input".to_string(),
            });
        }
        let trips = |t: &&str| self.fail_on.as_deref().is_some_and(|w| t.contains(w));
        if self.always_fail || texts.iter().any(trips) {
            return Err(ModelError::InferenceFailed {
                reason: "keyword classifier is unavailable".to_string(),
            });
        }
        Ok(texts.iter().map(|t| Self::score(t)).collect())
    }

    fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(crate::DEFAULT_BATCH_SIZE)
    }
}
