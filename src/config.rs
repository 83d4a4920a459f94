//! Runtime configuration loaded from the environment.
//!
//! Supported:
//! - INSURANCE_DB_PATH
//! - INSURANCE_MODEL_PATH
//! - INSURANCE_LOG_MODE=auto|file|stderr
//! - INSURANCE_LOG_FILE
//! - INSURANCE_HISTORY_LIMIT
//!
//! Unset or unparsable values keep their defaults.

use std::path::PathBuf;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// File when `INSURANCE_LOG_FILE` is set, stderr otherwise
    #[default]
    Auto,
    File,
    Stderr,
}

impl LogMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "file" => Some(Self::File),
            "stderr" => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// Snapshot of configuration values.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub model_path: PathBuf,
    pub log_mode: LogMode,
    pub log_file: Option<PathBuf>,
    pub history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("predictions.db"),
            model_path: PathBuf::from("models"),
            log_mode: LogMode::Auto,
            log_file: None,
            history_limit: 50,
        }
    }
}

impl AppConfig {
    /// Load config overrides from the process environment (best-effort).
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("INSURANCE_DB_PATH") {
            cfg.db_path = PathBuf::from(v.trim());
        }
        if let Some(v) = non_empty("INSURANCE_MODEL_PATH") {
            cfg.model_path = PathBuf::from(v.trim());
        }
        if let Some(mode) = non_empty("INSURANCE_LOG_MODE").and_then(|v| LogMode::parse(&v)) {
            cfg.log_mode = mode;
        }
        if let Some(v) = non_empty("INSURANCE_LOG_FILE") {
            cfg.log_file = Some(PathBuf::from(v.trim()));
        }
        if let Some(limit) = non_empty("INSURANCE_HISTORY_LIMIT")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
        {
            cfg.history_limit = limit;
        }

        cfg
    }

    /// Resolved log file, if logs should go to a file.
    #[must_use]
    pub fn log_target_file(&self) -> Option<PathBuf> {
        match self.log_mode {
            LogMode::Stderr => None,
            LogMode::Auto => self.log_file.clone(),
            LogMode::File => Some(
                self.log_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("insurance-cost.log")),
            ),
        }
    }
}
