//! Configuration for the junk filter
//!
//! Everything is optional in the file; missing values take the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{JunkError, Result};
use crate::junk::Params;

/// Main junk filter configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JunkConfig {
    /// Classifier parameters
    #[serde(default)]
    pub params: Params,
    /// Evaluation settings for test, analyze and play
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Filter file locations
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EvaluationConfig {
    /// Messages scoring above this are spam
    #[serde(default = "default_spam_threshold")]
    pub spam_threshold: f64,
    /// Fraction of messages used for training in analyze
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    /// Seed the analyze shuffle from the current time instead of a fixed seed
    #[serde(default)]
    pub seed: bool,
    /// Directory with sent messages, trained as ham
    pub sent_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_bloom_path")]
    pub bloom_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_spam_threshold() -> f64 {
    0.95
}

fn default_train_ratio() -> f64 {
    0.5
}

fn default_database_path() -> PathBuf {
    PathBuf::from("filter.db")
}

fn default_bloom_path() -> PathBuf {
    PathBuf::from("filter.bloom")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            spam_threshold: default_spam_threshold(),
            train_ratio: default_train_ratio(),
            seed: false,
            sent_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bloom_path: default_bloom_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl JunkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| JunkError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| JunkError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;

        if !(0.0..=1.0).contains(&self.evaluation.spam_threshold) {
            return Err(JunkError::Config(format!(
                "spam-threshold must be in [0, 1], got {}",
                self.evaluation.spam_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.evaluation.train_ratio) {
            return Err(JunkError::Config(format!(
                "train-ratio must be in [0, 1], got {}",
                self.evaluation.train_ratio
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = JunkConfig::default();
        assert_eq!(config.params, Params::default());
        assert_eq!(config.evaluation.spam_threshold, 0.95);
        assert_eq!(config.evaluation.train_ratio, 0.5);
        assert!(!config.evaluation.seed);
        assert_eq!(config.storage.database_path, PathBuf::from("filter.db"));
        assert_eq!(config.storage.bloom_path, PathBuf::from("filter.bloom"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[params]
one_grams = true
rare_words = 2

[evaluation]
spam_threshold = 0.9
sent_dir = "Sent"

[storage]
database_path = "/var/lib/junk/alice.db"
"#;
        let config: JunkConfig = toml::from_str(toml).unwrap();
        assert!(config.params.one_grams);
        assert!(config.params.two_grams);
        assert_eq!(config.params.rare_words, 2);
        assert_eq!(config.evaluation.spam_threshold, 0.9);
        assert_eq!(config.evaluation.train_ratio, 0.5);
        assert_eq!(config.evaluation.sent_dir, Some(PathBuf::from("Sent")));
        assert_eq!(
            config.storage.database_path,
            PathBuf::from("/var/lib/junk/alice.db")
        );
        assert_eq!(config.storage.bloom_path, PathBuf::from("filter.bloom"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: JunkConfig = toml::from_str("").unwrap();
        assert_eq!(config, JunkConfig::default());
    }

    #[test]
    fn test_from_file_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            JunkConfig::from_file(dir.path().join("missing.toml")),
            Err(JunkError::Config(_))
        ));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[params\ntop_words = ").unwrap();
        assert!(matches!(
            JunkConfig::from_file(&path),
            Err(JunkError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = JunkConfig::default();
        config.evaluation.spam_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = JunkConfig::default();
        config.evaluation.train_ratio = -0.1;
        assert!(config.validate().is_err());
    }
}
