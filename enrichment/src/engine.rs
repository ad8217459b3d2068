//! Incremental enrichment of one entity's raw posts.
//!
//! Only records whose id is not yet in the persisted file are scored. The
//! merged result is deduplicated by id with persisted rows winning, then
//! swapped into place atomically. Persisted rows are never dropped.

use crate::error::EnrichError;
use sentiment_engine::SentimentClassifier;
use std::collections::HashSet;
use std::path::Path;
use stocksent_core::{Classification, SentimentLabel, Table, TableError};
use tracing::{debug, info, warn};

/// Text columns in order of preference.
pub const TEXT_COLUMNS: [&str; 3] = ["fulltext", "text", "title"];
pub const ID_COLUMN: &str = "id";

pub const SENTIMENT_COLUMN: &str = "sentiment";
pub const PROB_NEGATIVE_COLUMN: &str = "prob_negative";
pub const PROB_NEUTRAL_COLUMN: &str = "prob_neutral";
pub const PROB_POSITIVE_COLUMN: &str = "prob_positive";
pub const SCORE_COLUMN: &str = "sentiment_score";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichOutcome {
    pub entity: String,
    pub new_records: usize,
    pub total_records: usize,
    /// Whether the persisted file was replaced.
    pub written: bool,
}

/// Result of merging one raw table into its persisted counterpart.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub new_records: usize,
    pub total_records: usize,
    /// The table to persist, or `None` when nothing changed.
    pub table: Option<Table>,
}

pub struct EnrichmentEngine<'a> {
    classifier: &'a dyn SentimentClassifier,
    text_columns: Vec<String>,
}

impl<'a> EnrichmentEngine<'a> {
    pub fn new(classifier: &'a dyn SentimentClassifier) -> Self {
        Self {
            classifier,
            text_columns: TEXT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_text_columns(mut self, text_columns: Vec<String>) -> Self {
        self.text_columns = text_columns;
        self
    }

    /// Enrich the posts in `raw_path` that are not yet in `result_path`.
    pub fn enrich_entity(
        &self,
        entity: &str,
        raw_path: &Path,
        result_path: &Path,
    ) -> Result<EnrichOutcome, EnrichError> {
        let raw = Table::read(raw_path)?;
        let persisted = Table::read_optional(result_path)?;
        let source = raw_path.display().to_string();

        let enrichment = self.enrich_tables(&raw, persisted.as_ref(), &source)?;

        let written = match &enrichment.table {
            Some(table) => {
                table.write_atomic(result_path)?;
                info!(
                    entity,
                    path = %result_path.display(),
                    total = enrichment.total_records,
                    "Updated: {} ({} total entries)",
                    result_path.display(),
                    enrichment.total_records
                );
                true
            }
            None => {
                info!(entity, "No new posts to analyze");
                false
            }
        };

        Ok(EnrichOutcome {
            entity: entity.to_string(),
            new_records: enrichment.new_records,
            total_records: enrichment.total_records,
            written,
        })
    }

    /// Merge `raw` into `persisted` in memory, scoring only the new records.
    pub fn enrich_tables(
        &self,
        raw: &Table,
        persisted: Option<&Table>,
        source: &str,
    ) -> Result<Enrichment, EnrichError> {
        let text_column = self.resolve_text_column(raw, source)?;

        let has_ids = raw.has_column(ID_COLUMN);
        let new_indices = if has_ids {
            let done = persisted_ids(persisted, source)?;
            new_record_indices(raw, &done)
        } else {
            warn!(
                source,
                "Raw file has no '{}' column, scoring every record", ID_COLUMN
            );
            (0..raw.len()).collect()
        };

        let existing = persisted.map(Table::len).unwrap_or(0);
        if new_indices.is_empty() {
            return Ok(Enrichment {
                new_records: 0,
                total_records: existing,
                table: None,
            });
        }

        info!(source, new = new_indices.len(), "{} new posts to analyze", new_indices.len());
        let mut fresh = raw.select_rows(&new_indices);
        self.annotate(&mut fresh, &text_column)?;

        let merged = match persisted {
            Some(p) => {
                let mut merged = p.clone();
                merged.append(&fresh);
                if has_ids {
                    let dropped = merged.dedupe_by(ID_COLUMN);
                    if dropped > 0 {
                        debug!(source, dropped, "Dropped duplicate ids while merging");
                    }
                }
                merged
            }
            None => fresh,
        };

        Ok(Enrichment {
            new_records: new_indices.len(),
            total_records: merged.len(),
            table: Some(merged),
        })
    }

    fn resolve_text_column(&self, raw: &Table, source: &str) -> Result<String, EnrichError> {
        self.text_columns
            .iter()
            .find(|c| raw.has_column(c))
            .cloned()
            .ok_or_else(|| EnrichError::NoTextColumn {
                path: source.to_string(),
                candidates: self.text_columns.clone(),
            })
    }

    fn annotate(&self, table: &mut Table, text_column: &str) -> Result<(), EnrichError> {
        let texts: Vec<&str> = table.column(text_column).unwrap_or_default();
        let classifications = self.classifier.classify_batch(&texts)?;

        let columns = [
            table.ensure_column(SENTIMENT_COLUMN),
            table.ensure_column(PROB_NEGATIVE_COLUMN),
            table.ensure_column(PROB_NEUTRAL_COLUMN),
            table.ensure_column(PROB_POSITIVE_COLUMN),
            table.ensure_column(SCORE_COLUMN),
        ];
        for (row, classification) in classifications.iter().enumerate() {
            for (&column, value) in columns.iter().zip(enrichment_cells(classification)) {
                table.set_cell(row, column, value);
            }
        }
        Ok(())
    }
}

fn enrichment_cells(c: &Classification) -> [String; 5] {
    let p = &c.probabilities;
    [
        c.label.as_str().to_string(),
        format!("{:?}", p.get(SentimentLabel::Negative)),
        format!("{:?}", p.get(SentimentLabel::Neutral)),
        format!("{:?}", p.get(SentimentLabel::Positive)),
        format!("{:?}", c.score()),
    ]
}

fn persisted_ids(persisted: Option<&Table>, source: &str) -> Result<HashSet<String>, EnrichError> {
    let Some(table) = persisted else {
        return Ok(HashSet::new());
    };
    if table.headers().is_empty() {
        return Ok(HashSet::new());
    }
    let ids = table.column(ID_COLUMN).ok_or_else(|| TableError::MissingColumn {
        column: ID_COLUMN.to_string(),
        path: format!("results for {}", source),
    })?;
    Ok(ids.into_iter().map(str::to_string).collect())
}

/// Rows of `raw` whose id is unseen, keeping the first of any repeated id.
fn new_record_indices(raw: &Table, done: &HashSet<String>) -> Vec<usize> {
    let ids = raw.column(ID_COLUMN).unwrap_or_default();
    let mut seen = HashSet::new();
    ids.iter()
        .enumerate()
        .filter(|(_, id)| !done.contains(**id) && seen.insert(**id))
        .map(|(i, _)| i)
        .collect()
}
