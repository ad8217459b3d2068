use stocksent_core::{CoreError, ErrorExt, ErrorSeverity, ModelError, TableError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("No text column in {path}; expected one of {candidates:?}")]
    NoTextColumn {
        path: String,
        candidates: Vec<String>,
    },

    #[error("Scoring failed: {0}")]
    Scoring(#[from] ModelError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Entity processing panicked: {message}")]
    Panicked { message: String },
}

impl EnrichError {
    /// Fatal errors stop the run instead of failing a single entity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EnrichError::Scoring(e) => e.severity(),
            EnrichError::Table(e) => e.severity(),
            EnrichError::NoTextColumn { .. } | EnrichError::Panicked { .. } => {
                ErrorSeverity::Entity
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }
}

impl From<EnrichError> for CoreError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::Scoring(e) => CoreError::Model(e),
            EnrichError::Table(e) => CoreError::Table(e),
            EnrichError::NoTextColumn { path, candidates } => CoreError::Table(
                TableError::MissingColumn {
                    column: candidates.join("|"),
                    path,
                },
            ),
            EnrichError::Panicked { message } => CoreError::Internal { message },
        }
    }
}
