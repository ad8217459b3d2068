use std::time::Duration;
use stocksent_core::{
    ConfigError, CoreError, ErrorExt, ErrorReporter, ErrorSeverity, ModelError, RedditApiError,
    TableError,
};

fn missing_id(path: &str) -> CoreError {
    CoreError::Table(TableError::MissingColumn {
        column: "id".to_string(),
        path: path.to_string(),
    })
}

#[test]
fn test_codes_come_from_the_inner_error() {
    assert_eq!(
        CoreError::RedditApi(RedditApiError::InvalidToken).error_code(),
        "REDDIT_INVALID_TOKEN"
    );
    assert_eq!(missing_id("apple_reddit.csv").error_code(), "TABLE_MISSING_COLUMN");
    assert_eq!(
        CoreError::Model(ModelError::ModelNotFound {
            model_path: "models/finbert-tone/model.safetensors".to_string(),
        })
        .error_code(),
        "MODEL_NOT_FOUND"
    );
    assert_eq!(CoreError::Timeout { seconds: 30 }.error_code(), "TIMEOUT");
}

#[test]
fn test_only_transient_reddit_failures_retry() {
    let rate_limited = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(rate_limited.is_retryable());
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

    let server = CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 });
    assert!(server.is_retryable());
    assert_eq!(server.retry_after(), None);

    let forbidden = CoreError::RedditApi(RedditApiError::Forbidden {
        resource: "/r/private/search".to_string(),
    });
    assert!(!forbidden.is_retryable());

    assert!(!missing_id("x.csv").is_retryable());
    assert_eq!(
        CoreError::Timeout { seconds: 30 }.retry_after(),
        Some(Duration::from_secs(30))
    );
}

#[test]
fn test_severity_taxonomy() {
    let load_failure = CoreError::Model(ModelError::ModelLoadingFailed {
        model_path: "models/finbert-tone".to_string(),
        reason: "bad header".to_string(),
    });
    assert_eq!(load_failure.severity(), ErrorSeverity::Fatal);
    assert!(load_failure.is_fatal());

    let config_error = CoreError::Config(ConfigError::InvalidValue {
        field: "model.batch_size".to_string(),
        value: "0".to_string(),
    });
    assert!(config_error.is_fatal());

    let batch_failure = CoreError::Model(ModelError::BatchFailed {
        batch_start: 0,
        batch_len: 16,
        reason: "out of memory".to_string(),
    });
    assert_eq!(batch_failure.severity(), ErrorSeverity::Entity);

    let unreadable = CoreError::Table(TableError::ReadFailed {
        path: "tesla_reddit.csv".to_string(),
        reason: "invalid utf-8".to_string(),
    });
    assert_eq!(unreadable.severity(), ErrorSeverity::Entity);

    let internal = CoreError::Internal {
        message: "enrichment task failed".to_string(),
    };
    assert_eq!(internal.severity(), ErrorSeverity::Entity);

    let tokenization = ModelError::TokenizationFailed {
        reason: "bad input".to_string(),
    };
    assert_eq!(tokenization.severity(), ErrorSeverity::Record);
}

#[test]
fn test_user_friendly_messages_name_the_fix() {
    let auth = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "401".to_string(),
    });
    assert!(auth.user_friendly_message().contains("reddit.client_secret"));

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "reddit.client_id".to_string(),
    });
    assert!(config_error.user_friendly_message().contains("reddit.client_id"));

    assert!(missing_id("apple_reddit.csv")
        .user_friendly_message()
        .contains("apple_reddit.csv"));

    // Without a dedicated hint the display text is reused.
    let invalid = CoreError::InvalidInput {
        message: "no dated sentiment scores".to_string(),
    };
    assert_eq!(invalid.user_friendly_message(), invalid.to_string());
}

#[test]
fn test_error_reporter_handles_every_severity() {
    let reporter = ErrorReporter::new();
    reporter.report(&CoreError::RedditApi(RedditApiError::RateLimitExceeded {
        retry_after: 5,
    }));
    reporter.report(&CoreError::Model(ModelError::TokenizationFailed {
        reason: "empty".to_string(),
    }));
    ErrorReporter::default()
        .with_hints(false)
        .report(&CoreError::Config(ConfigError::ValidationFailed {
            reason: "paths.raw_dir and paths.results_dir must differ".to_string(),
        }));
}
