//! File naming for tracked entities.
//!
//! A raw file `<entity>_reddit.csv` produces `<entity>_sentiment_reddit.csv`.
//! The entity part is taken verbatim from the raw filename; normalisation
//! only happens once, when the collector first creates a raw file.

use std::path::{Path, PathBuf};

pub const RAW_SUFFIX: &str = "_reddit.csv";
pub const RESULT_SUFFIX: &str = "_sentiment_reddit.csv";

/// A tracked entity and the files that belong to it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entity {
    pub name: String,
    pub raw_path: PathBuf,
    pub result_path: PathBuf,
}

impl Entity {
    pub fn new(name: &str, raw_dir: &Path, results_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            raw_path: raw_dir.join(raw_filename(name)),
            result_path: results_dir.join(result_filename(name)),
        }
    }
}

/// Lowercase and replace spaces with underscores: "Meta Platforms" -> "meta_platforms".
pub fn normalize_entity(company: &str) -> String {
    company.trim().to_lowercase().replace(' ', "_")
}

pub fn raw_filename(entity: &str) -> String {
    format!("{}{}", entity, RAW_SUFFIX)
}

pub fn result_filename(entity: &str) -> String {
    format!("{}{}", entity, RESULT_SUFFIX)
}

/// Entity name of a raw filename, or `None` if it doesn't follow the convention.
pub fn entity_from_raw_filename(filename: &str) -> Option<&str> {
    filename
        .strip_suffix(RAW_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// All entities with a raw file in `raw_dir`, sorted by name.
pub fn discover_entities(raw_dir: &Path, results_dir: &Path) -> std::io::Result<Vec<Entity>> {
    let mut entities = Vec::new();
    for entry in std::fs::read_dir(raw_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            tracing::warn!(file = ?entry.path(), "Skipping raw file with non UTF-8 name");
            continue;
        };
        match entity_from_raw_filename(file_name) {
            Some(name) => entities.push(Entity::new(name, raw_dir, results_dir)),
            None => tracing::debug!(file = file_name, "Ignoring file without raw suffix"),
        }
    }
    entities.sort();
    Ok(entities)
}
