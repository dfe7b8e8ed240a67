//! Service configuration.
//!
//! Loaded from a JSON file and validated after parse. The judge API key is
//! never stored in the file; the config names an environment variable and
//! the key is resolved from the process environment at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::compare::BatchPolicy;
use crate::error::ConfigError;
use crate::judge::gemini;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// SQLite database location. Defaults to `~/.bookdiff/data/bookdiff.db`
    /// when absent.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Root directory of the image store.
    pub storage_root: PathBuf,
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl JudgeConfig {
    /// Resolves the API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Result<SecretString, ConfigError> {
        std::env::var(&self.api_key_env)
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingApiKey {
                var_name: self.api_key_env.clone(),
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

impl BatchConfig {
    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch_size,
            batch_pause: Duration::from_millis(self.batch_pause_ms),
        }
    }
}

fn default_api_base_url() -> String {
    gemini::DEFAULT_API_BASE_URL.to_string()
}

fn default_model() -> String {
    gemini::DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_pause_ms() -> u64 {
    1000
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.storage_root.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "storageRoot must not be empty".to_string(),
        });
    }
    if config.judge.api_base_url.is_empty() {
        return Err(ConfigError::Validation {
            message: "judge.apiBaseUrl must not be empty".to_string(),
        });
    }
    if config.judge.model.is_empty() {
        return Err(ConfigError::Validation {
            message: "judge.model must not be empty".to_string(),
        });
    }
    if config.judge.api_key_env.is_empty() {
        return Err(ConfigError::Validation {
            message: "judge.apiKeyEnv must not be empty".to_string(),
        });
    }
    if config.judge.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "judge.timeoutSecs must be at least 1".to_string(),
        });
    }
    if config.batch.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "batch.batchSize must be at least 1".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = load_config_from_str(r#"{"storageRoot": "/var/lib/bookdiff/images"}"#).unwrap();
        assert!(config.database_path.is_none());
        assert_eq!(config.judge.model, gemini::DEFAULT_MODEL);
        assert_eq!(config.judge.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.batch.batch_size, 5);
        assert_eq!(config.batch.batch_pause_ms, 1000);
    }

    #[test]
    fn test_full_config_round_trip() {
        let config = load_config_from_str(
            r#"{
                "databasePath": "/data/bookdiff.db",
                "storageRoot": "/data/images",
                "judge": {
                    "apiBaseUrl": "https://example.test/v1",
                    "model": "vision-test",
                    "apiKeyEnv": "TEST_KEY",
                    "timeoutSecs": 10
                },
                "batch": { "batchSize": 2, "batchPauseMs": 50 }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/data/bookdiff.db"))
        );
        assert_eq!(config.judge.model, "vision-test");
        assert_eq!(config.judge.timeout(), Duration::from_secs(10));

        let policy = config.batch.policy();
        assert_eq!(policy.batch_size, 2);
        assert_eq!(policy.batch_pause, Duration::from_millis(50));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = load_config_from_str(
            r#"{"storageRoot": "/data", "batch": {"batchSize": 0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = load_config_from_str(
            r#"{"storageRoot": "/data", "judge": {"timeoutSecs": 0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = load_config_from_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseJson(_)));
    }

    #[test]
    fn test_resolve_api_key() {
        let mut judge = JudgeConfig::default();
        judge.api_key_env = "BOOKDIFF_TEST_KEY_PRESENT".to_string();
        std::env::set_var("BOOKDIFF_TEST_KEY_PRESENT", "sk-test");
        assert!(judge.resolve_api_key().is_ok());

        judge.api_key_env = "BOOKDIFF_TEST_KEY_ABSENT".to_string();
        let err = judge.resolve_api_key().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey { .. }));
    }
}
