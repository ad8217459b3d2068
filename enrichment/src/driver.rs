use crate::engine::{EnrichOutcome, EnrichmentEngine};
use crate::error::EnrichError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use stocksent_core::naming::discover_entities;
use stocksent_core::{CoreError, Entity, PathsConfig};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub new_records: usize,
}

impl RunSummary {
    pub fn entities(&self) -> usize {
        self.processed + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entities processed, {} failed, {} new posts scored",
            self.processed, self.failed, self.new_records
        )
    }
}

/// Runs the enrichment engine over every entity in the raw directory.
pub struct BatchDriver<'a> {
    engine: EnrichmentEngine<'a>,
    raw_dir: PathBuf,
    results_dir: PathBuf,
}

impl<'a> BatchDriver<'a> {
    pub fn new(engine: EnrichmentEngine<'a>, raw_dir: PathBuf, results_dir: PathBuf) -> Self {
        Self {
            engine,
            raw_dir,
            results_dir,
        }
    }

    pub fn from_config(engine: EnrichmentEngine<'a>, paths: &PathsConfig) -> Self {
        Self::new(engine, paths.raw_dir.clone(), paths.results_dir.clone())
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Process every entity once.
    ///
    /// A failing entity is logged and counted, and the run moves on. Only
    /// fatal errors, or failing to list the raw directory, end the run early.
    pub fn run(&self) -> Result<RunSummary, CoreError> {
        std::fs::create_dir_all(&self.results_dir)?;
        let entities = discover_entities(&self.raw_dir, &self.results_dir)?;
        if entities.is_empty() {
            warn!(raw_dir = %self.raw_dir.display(), "No raw files found");
        }

        let mut summary = RunSummary::default();
        for entity in &entities {
            info!(entity = %entity.name, "Processing {}", entity.raw_path.display());
            match self.process(entity) {
                Ok(outcome) => {
                    info!(
                        entity = %entity.name,
                        new = outcome.new_records,
                        total = outcome.total_records,
                        "{}: {} new posts, {} total",
                        entity.name,
                        outcome.new_records,
                        outcome.total_records
                    );
                    summary.processed += 1;
                    summary.new_records += outcome.new_records;
                }
                Err(e) if e.is_fatal() => {
                    error!(entity = %entity.name, error = %e, "Fatal error, aborting run");
                    return Err(e.into());
                }
                Err(e) => {
                    error!(entity = %entity.name, error = %e, "Error processing {}", entity.name);
                    summary.failed += 1;
                }
            }
        }

        info!(
            processed = summary.processed,
            failed = summary.failed,
            new_records = summary.new_records,
            "Run complete: {}",
            summary
        );
        Ok(summary)
    }

    fn process(&self, entity: &Entity) -> Result<EnrichOutcome, EnrichError> {
        catch_unwind(AssertUnwindSafe(|| {
            self.engine
                .enrich_entity(&entity.name, &entity.raw_path, &entity.result_path)
        }))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(EnrichError::Panicked { message })
        })
    }
}
