//! TOML configuration with per-field defaults and environment overrides for
//! the Reddit credentials.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "stocksent.toml";

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub model: ModelConfig,
    pub reddit: RedditConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub results_dir: PathBuf,
    pub log_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data_collection/data"),
            results_dir: PathBuf::from("sentiment_analysis/results"),
            log_file: PathBuf::from("sentiment_analysis/enrich_sentiment.log"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    pub model_dir: PathBuf,
    pub batch_size: usize,
    pub max_tokens: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/finbert-tone"),
            batch_size: 16,
            max_tokens: 128,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_agent: Option<String>,
    pub companies: Vec<String>,
    pub subreddits: Vec<String>,
    pub posts_per_subreddit: u32,
    pub sleep_seconds: u64,
    pub interval_minutes: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: None,
            companies: vec![
                "Apple".to_string(),
                "Tesla".to_string(),
                "Microsoft".to_string(),
            ],
            subreddits: vec!["stocks".to_string()],
            posts_per_subreddit: 20,
            sleep_seconds: 5,
            interval_minutes: 60,
        }
    }
}

/// Credentials needed for an app-only Reddit session.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl RedditConfig {
    pub fn credentials(&self) -> Result<RedditCredentials, ConfigError> {
        fn required(value: &Option<String>, field: &str) -> Result<String, ConfigError> {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingField {
                    field: field.to_string(),
                })
        }

        Ok(RedditCredentials {
            client_id: required(&self.client_id, "reddit.client_id")?,
            client_secret: required(&self.client_secret, "reddit.client_secret")?,
            user_agent: required(&self.user_agent, "reddit.user_agent")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub n_days: i64,
    pub rolling_window_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_days: 60,
            rolling_window_days: 3,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when no path is given.
    ///
    /// An explicit path must exist; a missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: p.display().to_string(),
                    });
                }
                Self::from_file(p)?
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => ConfigError::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::InvalidFormat {
                details: e.to_string(),
            },
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Override Reddit credentials from the environment. Takes a lookup
    /// function so tests don't have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_CLIENT_ID) {
            self.reddit.client_id = Some(v);
        }
        if let Some(v) = lookup(ENV_CLIENT_SECRET) {
            self.reddit.client_secret = Some(v);
        }
        if let Some(v) = lookup(ENV_USER_AGENT) {
            self.reddit.user_agent = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model.batch_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "model.max_tokens".to_string(),
                value: "0".to_string(),
            });
        }
        if self.analysis.rolling_window_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.rolling_window_days".to_string(),
                value: self.analysis.rolling_window_days.to_string(),
            });
        }
        if self.analysis.n_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.n_days".to_string(),
                value: self.analysis.n_days.to_string(),
            });
        }
        if self.paths.raw_dir == self.paths.results_dir {
            return Err(ConfigError::ValidationFailed {
                reason: "paths.raw_dir and paths.results_dir must differ".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.model.batch_size, 16);
        assert_eq!(config.model.max_tokens, 128);
        assert_eq!(config.paths.raw_dir, PathBuf::from("data_collection/data"));
        assert_eq!(config.analysis.rolling_window_days, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [model]
            batch_size = 4

            [reddit]
            subreddits = ["stocks", "investing"]
            "#,
        )
        .unwrap();
        assert_eq!(config.model.batch_size, 4);
        assert_eq!(config.model.max_tokens, 128);
        assert_eq!(config.reddit.subreddits, vec!["stocks", "investing"]);
        assert_eq!(config.reddit.posts_per_subreddit, 20);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = AppConfig::from_toml_str("[model]\nbatch_size = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_env_overrides_credentials() {
        let mut config = AppConfig::from_toml_str(
            "[reddit]\nclient_id = \"from_file\"\nuser_agent = \"ua\"\n",
        )
        .unwrap();
        config.apply_env(|key| match key {
            ENV_CLIENT_ID => Some("from_env".to_string()),
            ENV_CLIENT_SECRET => Some("secret".to_string()),
            _ => None,
        });

        let creds = config.reddit.credentials().unwrap();
        assert_eq!(creds.client_id, "from_env");
        assert_eq!(creds.client_secret, "secret");
        assert_eq!(creds.user_agent, "ua");
    }

    #[test]
    fn test_missing_credentials() {
        let config = AppConfig::default();
        match config.reddit.credentials() {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "reddit.client_id"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_missing_file() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/stocksent.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let result = AppConfig::from_toml_str("[model\nbatch_size = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
