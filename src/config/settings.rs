//! Process-level run settings.
//!
//! Loaded from environment variables and an optional `.env` file. These
//! only decide which config file the store uses and how logging is set
//! up; everything else lives in the store itself.

use std::path::PathBuf;

use super::source::{self, ConfigSource, DEFAULT_CONFIG_DIR, DEFAULT_RESOURCES_DIR};

/// Settings read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Selected environment (`TEST_ENV`, `ENV`, default `qa`).
    pub environment: String,
    /// Explicit config file; selects the fixed-path policy when set.
    pub config_file: Option<PathBuf>,
    pub config_dir: PathBuf,
    pub resources_dir: PathBuf,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl RunSettings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();
        Self::from_lookup(None, |key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit environment
    /// argument taking precedence over env vars.
    pub fn for_environment(environment: &str) -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(Some(environment), |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(explicit_env: Option<&str>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            environment: source::select_environment_from(explicit_env, &lookup),
            config_file: env_opt(&lookup, "CONFIG_FILE").map(PathBuf::from),
            config_dir: PathBuf::from(env_str(&lookup, "CONFIG_DIR", DEFAULT_CONFIG_DIR)),
            resources_dir: PathBuf::from(env_str(&lookup, "RESOURCES_DIR", DEFAULT_RESOURCES_DIR)),
            log_level: env_str(&lookup, "LOG_LEVEL", "info"),
            log_json: env_bool(&lookup, "LOG_JSON", false),
        }
    }

    /// Resolution policy for the config store.
    pub fn source(&self) -> ConfigSource {
        let source = match &self.config_file {
            Some(path) => ConfigSource::fixed(path.clone()),
            None => ConfigSource::environment(&self.environment, self.config_dir.clone()),
        };
        source.with_resources_dir(self.resources_dir.clone())
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_opt<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_str<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: &str) -> String {
    env_opt(lookup, key).unwrap_or_else(|| default.to_string())
}

fn env_bool<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: bool) -> bool {
    env_opt(lookup, key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}
