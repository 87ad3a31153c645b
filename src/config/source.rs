//! Backing-file resolution policy.
//!
//! A store is built with one [`ConfigSource`], which decides where its
//! properties come from and where updates are persisted.

use std::path::{Path, PathBuf};

/// Environment used when nothing selects one.
pub const DEFAULT_ENVIRONMENT: &str = "qa";

/// Name of the environment-independent file.
pub const DEFAULT_FILE_NAME: &str = "config.properties";

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_RESOURCES_DIR: &str = "resources";

/// Process env vars consulted, in order, for the environment name.
pub const ENVIRONMENT_VARS: [&str; 2] = ["TEST_ENV", "ENV"];

/// Defaults compiled into the binary; the last fallback tier.
pub const BUILTIN_DEFAULTS: &str = include_str!("../../resources/config.properties");

/// Where a store's properties should be loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// One explicit file.
    FixedPath {
        path: PathBuf,
        resources_dir: PathBuf,
    },
    /// `config-<name>.properties` inside `config_dir`.
    Environment {
        name: String,
        config_dir: PathBuf,
        resources_dir: PathBuf,
    },
}

/// Which fallback tier supplied the loaded properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTier {
    ExplicitFile,
    EnvironmentFile,
    DefaultFile,
    BundledResource,
    BuiltIn,
}

/// One place to try during loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub tier: LoadTier,
    /// `None` for the built-in defaults.
    pub path: Option<PathBuf>,
}

impl Candidate {
    fn file(tier: LoadTier, path: PathBuf) -> Self {
        Self {
            tier,
            path: Some(path),
        }
    }
}

impl ConfigSource {
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self::FixedPath {
            path: path.into(),
            resources_dir: PathBuf::from(DEFAULT_RESOURCES_DIR),
        }
    }

    pub fn environment(name: &str, config_dir: impl Into<PathBuf>) -> Self {
        Self::Environment {
            name: normalize_environment(name),
            config_dir: config_dir.into(),
            resources_dir: PathBuf::from(DEFAULT_RESOURCES_DIR),
        }
    }

    /// Replace the directory searched for bundled resources.
    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        match &mut self {
            Self::FixedPath { resources_dir, .. } | Self::Environment { resources_dir, .. } => {
                *resources_dir = dir.into();
            }
        }
        self
    }

    pub fn resources_dir(&self) -> &Path {
        match self {
            Self::FixedPath { resources_dir, .. } | Self::Environment { resources_dir, .. } => {
                resources_dir
            }
        }
    }

    /// Environment name, if this source is environment-scoped.
    pub fn environment_name(&self) -> Option<&str> {
        match self {
            Self::FixedPath { .. } => None,
            Self::Environment { name, .. } => Some(name),
        }
    }

    /// File that receives updates when no file candidate loaded.
    pub fn primary_path(&self) -> PathBuf {
        match self {
            Self::FixedPath { path, .. } => path.clone(),
            Self::Environment {
                name, config_dir, ..
            } => config_dir.join(environment_file_name(name)),
        }
    }

    /// Candidates in the order they are tried.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut out = Vec::new();
        match self {
            Self::FixedPath {
                path,
                resources_dir,
            } => {
                out.push(Candidate::file(LoadTier::ExplicitFile, path.clone()));
                if let Some(file_name) = path.file_name() {
                    out.push(Candidate::file(
                        LoadTier::BundledResource,
                        resources_dir.join(file_name),
                    ));
                }
            }
            Self::Environment {
                name,
                config_dir,
                resources_dir,
            } => {
                let env_file = environment_file_name(name);
                out.push(Candidate::file(
                    LoadTier::EnvironmentFile,
                    config_dir.join(&env_file),
                ));
                out.push(Candidate::file(
                    LoadTier::DefaultFile,
                    config_dir.join(DEFAULT_FILE_NAME),
                ));
                out.push(Candidate::file(
                    LoadTier::BundledResource,
                    resources_dir.join(&env_file),
                ));
            }
        }
        out.push(Candidate {
            tier: LoadTier::BuiltIn,
            path: None,
        });
        out
    }
}

/// `config-<env>.properties`.
pub fn environment_file_name(env: &str) -> String {
    format!("config-{}.properties", env)
}

/// Pick the environment name: explicit argument, then the env vars in
/// [`ENVIRONMENT_VARS`] via `lookup`, then [`DEFAULT_ENVIRONMENT`].
pub fn select_environment_from<F>(explicit: Option<&str>, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            ENVIRONMENT_VARS
                .iter()
                .filter_map(|var| lookup(*var))
                .find(|v| !v.trim().is_empty())
        })
        .map(|v| normalize_environment(&v))
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

fn normalize_environment(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        DEFAULT_ENVIRONMENT.to_string()
    } else {
        name
    }
}
