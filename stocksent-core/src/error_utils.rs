use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

/// How far an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Aborts the whole run.
    Fatal,
    /// Fails the current entity; the run continues with the next one.
    Entity,
    /// Absorbed by a fallback for a single record.
    Record,
}

pub trait ErrorExt: std::error::Error {
    fn severity(&self) -> ErrorSeverity;

    /// Stable machine-readable code, e.g. for log filtering.
    fn error_code(&self) -> &'static str;

    fn user_friendly_message(&self) -> String {
        self.to_string()
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }

    fn log_error(&self) -> &Self
    where
        Self: Sized,
    {
        error!(code = self.error_code(), severity = ?self.severity(), "{}", self);
        self
    }
}

impl ErrorExt for CoreError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::Model(e) => e.severity(),
            CoreError::Config(e) => e.severity(),
            _ => ErrorSeverity::Entity,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::Table(e) => e.error_code(),
            CoreError::Model(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::Timeout { .. } => "TIMEOUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::RequestFailed { .. } => "REQUEST_FAILED",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Table(e) => e.user_friendly_message(),
            CoreError::Model(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Could not reach Reddit. Check the network connection.".to_string()
            }
            CoreError::Timeout { seconds } => {
                format!("Gave up after {} seconds without a response.", seconds)
            }
            other => other.to_string(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

impl ErrorExt for RedditApiError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Entity
    }

    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit rejected the app credentials. Check reddit.client_id and reddit.client_secret."
                    .to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => {
                format!("Reddit is rate limiting requests for {} seconds.", retry_after)
            }
            RedditApiError::Forbidden { resource } => {
                format!("{} is private, quarantined or banned.", resource)
            }
            RedditApiError::InvalidToken => {
                "The Reddit access token expired or was revoked.".to_string()
            }
            other => other.to_string(),
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedditApiError::RateLimitExceeded { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::ServerError { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }
}

impl ErrorExt for TableError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Entity
    }

    fn error_code(&self) -> &'static str {
        match self {
            TableError::ReadFailed { .. } => "TABLE_READ_FAILED",
            TableError::MalformedRow { .. } => "TABLE_MALFORMED_ROW",
            TableError::MissingColumn { .. } => "TABLE_MISSING_COLUMN",
            TableError::WriteFailed { .. } => "TABLE_WRITE_FAILED",
            TableError::PersistFailed { .. } => "TABLE_PERSIST_FAILED",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            TableError::ReadFailed { path, .. } => {
                format!("Could not read '{}'. The file may be missing or corrupt.", path)
            }
            TableError::MalformedRow { path, line, .. } => {
                format!("Row {} of '{}' could not be parsed.", line, path)
            }
            TableError::MissingColumn { column, path } => {
                format!("Column '{}' is required in '{}'.", column, path)
            }
            TableError::WriteFailed { path, .. } | TableError::PersistFailed { path, .. } => {
                format!("Could not save '{}'. The previous version is untouched.", path)
            }
        }
    }
}

impl ErrorExt for ModelError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            ModelError::ModelLoadingFailed { .. }
            | ModelError::ModelNotFound { .. }
            | ModelError::InvalidModelConfig { .. }
            | ModelError::HardwareIncompatible { .. } => ErrorSeverity::Fatal,
            ModelError::TokenizationFailed { .. } => ErrorSeverity::Record,
            ModelError::InferenceFailed { .. } | ModelError::BatchFailed { .. } => {
                ErrorSeverity::Entity
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ModelError::ModelLoadingFailed { .. } => "MODEL_LOAD_FAILED",
            ModelError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            ModelError::InvalidModelConfig { .. } => "MODEL_INVALID_CONFIG",
            ModelError::HardwareIncompatible { .. } => "MODEL_HARDWARE_INCOMPATIBLE",
            ModelError::TokenizationFailed { .. } => "MODEL_TOKENIZATION_FAILED",
            ModelError::InferenceFailed { .. } => "MODEL_INFERENCE_FAILED",
            ModelError::BatchFailed { .. } => "MODEL_BATCH_FAILED",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ModelError::ModelNotFound { model_path } => format!(
                "'{}' is missing. Download the FinBERT weights, tokenizer and config into model.model_dir.",
                model_path
            ),
            ModelError::HardwareIncompatible { details } => {
                format!("The compute device is not usable: {}", details)
            }
            ModelError::BatchFailed { batch_len, .. } => format!(
                "None of the {} posts in a batch could be scored; the file was left unchanged.",
                batch_len
            ),
            other => other.to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }

    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidFormat { .. } => "CONFIG_INVALID_FORMAT",
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED",
            ConfigError::PermissionDenied { .. } => "CONFIG_PERMISSION_DENIED",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::MissingField { field } => format!(
                "'{}' is not set in stocksent.toml or the environment.",
                field
            ),
            ConfigError::InvalidValue { field, value } => {
                format!("'{}' cannot be {}.", field, value)
            }
            other => other.to_string(),
        }
    }
}

/// Logs an error at the level its severity calls for, followed by hints.
pub struct ErrorReporter {
    hints: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self { hints: true }
    }

    pub fn with_hints(mut self, enabled: bool) -> Self {
        self.hints = enabled;
        self
    }

    pub fn report(&self, error: &CoreError) {
        match error.severity() {
            ErrorSeverity::Record => warn!(code = error.error_code(), "{}", error),
            _ => error!(code = error.error_code(), "{}", error),
        }
        if !self.hints {
            return;
        }

        let hint = error.user_friendly_message();
        if hint != error.to_string() {
            info!("{}", hint);
        }
        if error.is_retryable() {
            match error.retry_after() {
                Some(delay) => info!("Retryable after {:?}", delay),
                None => info!("Retryable"),
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
