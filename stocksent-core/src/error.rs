use thiserror::Error;

/// Umbrella error for everything above a single crate.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Request failed with status {status_code}: {message}")]
    RequestFailed { message: String, status_code: u16 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures reported by, or while talking to, the Reddit API.
#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Access to {resource} is forbidden")]
    Forbidden { resource: String },

    /// The bearer token was rejected; a fresh one may succeed.
    #[error("Access token rejected")]
    InvalidToken,

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Unexpected response body: {details}")]
    InvalidResponse { details: String },

    #[error("Reddit returned server error {status_code}")]
    ServerError { status_code: u16 },
}

/// Reading, validating or replacing one CSV file.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },

    #[error("Malformed row {line} in {path}: {reason}")]
    MalformedRow {
        path: String,
        line: u64,
        reason: String,
    },

    #[error("Missing column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    /// The temporary file was written but could not replace the target.
    #[error("Failed to replace {path}: {reason}")]
    PersistFailed { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load model from {model_path}: {reason}")]
    ModelLoadingFailed { model_path: String, reason: String },

    #[error("Model file not found: {model_path}")]
    ModelNotFound { model_path: String },

    #[error("Unsupported model configuration: {details}")]
    InvalidModelConfig { details: String },

    #[error("Compute device unusable: {details}")]
    HardwareIncompatible { details: String },

    #[error("Tokenization failed: {reason}")]
    TokenizationFailed { reason: String },

    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },

    /// Every item of a multi-item chunk also failed on its own.
    #[error("Batch of {batch_len} starting at {batch_start} failed for every item: {reason}")]
    BatchFailed {
        batch_start: usize,
        batch_len: usize,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Unreadable configuration: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration rejected: {reason}")]
    ValidationFailed { reason: String },

    #[error("Permission denied reading {path}")]
    PermissionDenied { path: String },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
