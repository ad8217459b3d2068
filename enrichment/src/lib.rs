//! Incremental sentiment enrichment of per-entity Reddit post files.

pub mod driver;
pub mod engine;
pub mod error;

pub use driver::{BatchDriver, RunSummary};
pub use engine::{EnrichOutcome, Enrichment, EnrichmentEngine, TEXT_COLUMNS};
pub use error::EnrichError;
