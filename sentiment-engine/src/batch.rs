use crate::SentimentClassifier;
use stocksent_core::{Classification, ErrorExt, ErrorSeverity, ModelError, Probabilities};
use tracing::{debug, warn};

/// Split `texts` into chunks of `batch_size` and classify each chunk.
///
/// Blank texts never reach the classifier and come back as the neutral
/// fallback. If a chunk's forward pass fails, its texts are retried one at a
/// time. Only a text the model cannot take as input (a record-level error
/// such as [`ModelError::TokenizationFailed`]) degrades to neutral. Any other
/// per-item failure fails the whole call as [`ModelError::BatchFailed`], and
/// fatal errors are returned as they are.
pub fn classify_batch<C>(
    classifier: &C,
    texts: &[&str],
    batch_size: usize,
) -> Result<Vec<Classification>, ModelError>
where
    C: SentimentClassifier + ?Sized,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(texts.len());

    for (chunk_idx, chunk) in texts.chunks(batch_size).enumerate() {
        let batch_start = chunk_idx * batch_size;
        debug!(
            batch_start,
            batch_len = chunk.len(),
            "Scoring sentiment batch"
        );
        results.extend(classify_chunk(classifier, chunk, batch_start)?);
    }

    Ok(results)
}

fn classify_chunk<C>(
    classifier: &C,
    chunk: &[&str],
    batch_start: usize,
) -> Result<Vec<Classification>, ModelError>
where
    C: SentimentClassifier + ?Sized,
{
    let mut out = vec![Classification::neutral_fallback(); chunk.len()];
    let scored: Vec<usize> = (0..chunk.len())
        .filter(|&i| !chunk[i].trim().is_empty())
        .collect();
    if scored.is_empty() {
        return Ok(out);
    }

    let inputs: Vec<&str> = scored.iter().map(|&i| chunk[i]).collect();
    let batched = match classifier.classify_chunk(&inputs) {
        Ok(probs) if probs.len() == inputs.len() => Some(probs),
        Ok(probs) => {
            warn!(
                batch_start,
                expected = inputs.len(),
                got = probs.len(),
                "Classifier returned wrong number of results, retrying items individually"
            );
            None
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(batch_start, error = %e, "Batch scoring failed, retrying items individually");
            None
        }
    };

    if let Some(probs) = batched {
        for (&i, p) in scored.iter().zip(probs) {
            out[i] = Classification::from_probabilities(p);
        }
        return Ok(out);
    }

    for &i in &scored {
        match classify_single(classifier, chunk[i]) {
            Ok(p) => out[i] = Classification::from_probabilities(p),
            Err(e) if e.severity() == ErrorSeverity::Record => {
                warn!(
                    record = batch_start + i,
                    error = %e,
                    "Falling back to neutral for unscorable text"
                );
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Err(ModelError::BatchFailed {
                    batch_start,
                    batch_len: chunk.len(),
                    reason: e.to_string(),
                })
            }
        }
    }

    Ok(out)
}

fn classify_single<C>(classifier: &C, text: &str) -> Result<Probabilities, ModelError>
where
    C: SentimentClassifier + ?Sized,
{
    let mut probs = classifier.classify_chunk(&[text])?;
    if probs.len() != 1 {
        return Err(ModelError::InferenceFailed {
            reason: format!("expected 1 result, got {}", probs.len()),
        });
    }
    Ok(probs.remove(0))
}
