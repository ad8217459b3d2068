//! Financial sentiment scoring over raw text.
//!
//! [`SentimentClassifier`] is the seam between the enrichment pipeline and
//! the model: implementors score one chunk of non-empty texts per call, and
//! the provided [`SentimentClassifier::classify_batch`] handles chunking,
//! empty-text fallbacks and per-item degradation.

pub mod batch;
pub mod finbert;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use finbert::{select_device, FinBert};

use stocksent_core::{Classification, ModelError, Probabilities};

pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_MAX_TOKENS: usize = 128;

pub trait SentimentClassifier {
    /// Run one forward pass over `texts`, all of which are non-empty.
    ///
    /// Must return exactly one probability vector per input, in input order.
    fn classify_chunk(&self, texts: &[&str]) -> Result<Vec<Probabilities>, ModelError>;

    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Classify any number of texts, one result per input, order preserved.
    fn classify_batch(&self, texts: &[&str]) -> Result<Vec<Classification>, ModelError> {
        batch::classify_batch(self, texts, self.batch_size())
    }
}
