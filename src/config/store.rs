//! File-backed property store shared by the whole suite.
//!
//! `ConfigStore` is a cheap `Clone` handle; every clone sees the same
//! properties, so a session token written after login is visible to all
//! API clients holding the store. Operations never panic or return errors
//! for missing files, missing keys or malformed values: they log a warning
//! and fall back to a default. The only failure signal is the `bool`
//! returned by `update`/`remove`.
//!
//! Concurrent writers are serialized inside one process; nothing guards the
//! backing file against other processes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::placeholder;
use super::properties::{self, PropertySet};
use super::source::{ConfigSource, LoadTier, BUILTIN_DEFAULTS};

/// Reserved key holding the current session token.
pub const SESSION_TOKEN_KEY: &str = "api.sessionID";

/// First comment line of every persisted file.
const FILE_HEADER: &str = "Updated by brokerage-qa-harness";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unloaded,
    Loaded,
}

#[derive(Debug)]
struct Inner {
    source: ConfigSource,
    properties: PropertySet,
    backing_path: PathBuf,
    loaded_from: Option<LoadTier>,
    state: StoreState,
}

/// Thread-safe handle to a file-backed property set.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Inner>>,
}

static SHARED: OnceLock<ConfigStore> = OnceLock::new();

impl ConfigStore {
    /// Create an unloaded store. Properties are loaded on first access.
    pub fn new(source: ConfigSource) -> Self {
        let backing_path = absolute(source.primary_path());
        Self {
            inner: Arc::new(RwLock::new(Inner {
                source,
                properties: PropertySet::new(),
                backing_path,
                loaded_from: None,
                state: StoreState::Unloaded,
            })),
        }
    }

    /// Create a store and load it immediately.
    pub fn open(source: ConfigSource) -> Self {
        let store = Self::new(source);
        drop(store.loaded());
        store
    }

    /// Install the process-wide store. Fails (returning the argument) if one
    /// is already installed.
    pub fn init_shared(store: ConfigStore) -> Result<(), ConfigStore> {
        SHARED.set(store)
    }

    /// The process-wide store, created from the process environment on
    /// first use when nothing was installed.
    pub fn shared() -> &'static ConfigStore {
        SHARED.get_or_init(|| {
            let settings = super::settings::RunSettings::from_env();
            ConfigStore::new(settings.source())
        })
    }

    // =========================================================================
    // Locking
    // =========================================================================

    fn read_guard(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read access, loading exactly once on first use.
    fn loaded(&self) -> RwLockReadGuard<'_, Inner> {
        {
            let guard = self.read_guard();
            if guard.state == StoreState::Loaded {
                return guard;
            }
        }
        drop(self.loaded_mut());
        self.read_guard()
    }

    fn loaded_mut(&self) -> RwLockWriteGuard<'_, Inner> {
        let mut guard = self.write_guard();
        if guard.state == StoreState::Unloaded {
            guard.load_from_source();
        }
        guard
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Re-target the store at `path` and load it.
    pub fn load(&self, path: impl AsRef<Path>) {
        let mut guard = self.write_guard();
        let resources_dir = guard.source.resources_dir().to_path_buf();
        guard.source = ConfigSource::fixed(path.as_ref()).with_resources_dir(resources_dir);
        guard.load_from_source();
    }

    /// Re-read the backing file, discarding unpersisted in-memory changes.
    pub fn reload(&self) {
        let mut guard = self.loaded_mut();
        let path = guard.backing_path.clone();
        match properties::read_file(&path) {
            Ok(set) => {
                debug!(path = %path.display(), keys = set.len(), "Config reloaded");
                let tier = guard.backing_tier();
                guard.properties = set;
                guard.loaded_from = Some(tier);
            }
            Err(e) => {
                warn!(error = %e, "Backing file unreadable, reloading from fallbacks");
                let backing = guard.backing_path.clone();
                guard.load_from_source();
                guard.backing_path = backing;
            }
        }
    }

    /// Switch an environment-scoped store to another environment.
    ///
    /// Returns `false` for fixed-path stores.
    pub fn switch_environment(&self, name: &str) -> bool {
        let mut guard = self.write_guard();
        let next = match &guard.source {
            ConfigSource::FixedPath { .. } => {
                warn!(environment = %name, "Fixed-path config store cannot switch environment");
                return false;
            }
            ConfigSource::Environment {
                config_dir,
                resources_dir,
                ..
            } => ConfigSource::environment(name, config_dir.clone())
                .with_resources_dir(resources_dir.clone()),
        };
        info!(environment = ?next.environment_name(), "Switching config environment");
        guard.source = next;
        guard.load_from_source();
        true
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Value for `key` with placeholders resolved.
    pub fn get(&self, key: &str) -> Option<String> {
        let guard = self.loaded();
        guard.properties.get(key).map(|raw| guard.resolve(raw))
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get_parsed(key, default)
    }

    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        self.get_parsed(key, default)
    }

    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`, case-insensitively.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => {
                warn!(key, value = %raw, default, "Invalid boolean config value, using default");
                default
            }
        }
    }

    fn get_parsed<T>(&self, key: &str, default: T) -> T
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(key, value = %raw, %default, "Invalid numeric config value, using default");
                default
            }
        }
    }

    /// Resolve `${name}` references in an arbitrary string against this store.
    pub fn resolve_placeholders(&self, value: &str) -> String {
        self.loaded().resolve(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.loaded().properties.contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.loaded().properties.keys().cloned().collect()
    }

    /// Copy of the raw (unresolved) properties.
    pub fn snapshot(&self) -> PropertySet {
        self.loaded().properties.clone()
    }

    pub fn backing_path(&self) -> PathBuf {
        self.read_guard().backing_path.clone()
    }

    pub fn state(&self) -> StoreState {
        self.read_guard().state
    }

    pub fn loaded_from(&self) -> Option<LoadTier> {
        self.read_guard().loaded_from
    }

    pub fn source(&self) -> ConfigSource {
        self.read_guard().source.clone()
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Set `key` in memory and persist the whole set.
    ///
    /// Returns `true` only if the file was written and a fresh parse of it
    /// matches the in-memory set. On `false` the in-memory value is still
    /// updated.
    pub fn update(&self, key: &str, value: &str) -> bool {
        let mut guard = self.loaded_mut();
        guard.properties.insert(key.to_string(), value.to_string());
        guard.persist_and_verify(key)
    }

    /// Remove `key` and persist. Same return contract as [`update`](Self::update).
    pub fn remove(&self, key: &str) -> bool {
        let mut guard = self.loaded_mut();
        if guard.properties.remove(key).is_none() {
            debug!(key, "Removing absent config key");
        }
        guard.persist_and_verify(key)
    }

    // =========================================================================
    // Session token
    // =========================================================================

    /// Current session token, or `""` when none is stored.
    pub fn session_token(&self) -> String {
        match self.get(SESSION_TOKEN_KEY) {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!(key = SESSION_TOKEN_KEY, "Session token is not set");
                String::new()
            }
        }
    }

    /// Store a new session token. Empty tokens are rejected.
    pub fn update_session_token(&self, token: &str) -> bool {
        if token.trim().is_empty() {
            warn!("Refusing to store empty session token");
            return false;
        }
        let ok = self.update(SESSION_TOKEN_KEY, token);
        if ok {
            info!(token = %mask(token), "Session token updated");
        } else {
            warn!(token = %mask(token), "Session token updated in memory only");
        }
        ok
    }

    pub fn clear_session_token(&self) -> bool {
        self.update(SESSION_TOKEN_KEY, "")
    }
}

impl Inner {
    fn resolve(&self, value: &str) -> String {
        placeholder::resolve(value, |name| self.properties.get(name).cloned())
    }

    /// Tier of the file updates are written to.
    fn backing_tier(&self) -> LoadTier {
        self.source
            .candidates()
            .into_iter()
            .filter(|c| c.tier != LoadTier::BundledResource)
            .find(|c| {
                c.path
                    .as_ref()
                    .is_some_and(|p| absolute(p.clone()) == self.backing_path)
            })
            .map(|c| c.tier)
            .unwrap_or(match self.source {
                ConfigSource::FixedPath { .. } => LoadTier::ExplicitFile,
                ConfigSource::Environment { .. } => LoadTier::EnvironmentFile,
            })
    }

    /// Walk the source's fallback chain. Always ends `Loaded`.
    fn load_from_source(&mut self) {
        self.properties.clear();
        self.loaded_from = None;
        self.backing_path = absolute(self.source.primary_path());

        for candidate in self.source.candidates() {
            let Some(path) = candidate.path else {
                self.properties = properties::parse(BUILTIN_DEFAULTS);
                self.loaded_from = Some(candidate.tier);
                warn!(
                    backing = %self.backing_path.display(),
                    "No config file found, using built-in defaults"
                );
                break;
            };

            match properties::read_file(&path) {
                Ok(set) => {
                    // Bundled resources are templates; updates go to the primary path.
                    if candidate.tier != LoadTier::BundledResource {
                        self.backing_path = absolute(path.clone());
                    }
                    info!(
                        path = %path.display(),
                        backing = %self.backing_path.display(),
                        tier = ?candidate.tier,
                        keys = set.len(),
                        "Config loaded"
                    );
                    self.properties = set;
                    self.loaded_from = Some(candidate.tier);
                    break;
                }
                Err(e) => {
                    debug!(error = %e, tier = ?candidate.tier, "Config candidate unavailable");
                }
            }
        }

        self.state = StoreState::Loaded;
    }

    fn persist_and_verify(&self, key: &str) -> bool {
        let path = &self.backing_path;

        if let Err(e) = properties::write_file(path, &self.properties, FILE_HEADER) {
            warn!(error = %e, key, "Failed to persist config");
            return false;
        }

        if !verify(&self.properties, path) {
            warn!(path = %path.display(), key, "Config verification failed after write");
            return false;
        }

        debug!(path = %path.display(), key, "Config persisted and verified");
        true
    }
}

/// Re-read `path` and compare every entry with `expected`.
fn verify(expected: &PropertySet, path: &Path) -> bool {
    let on_disk = match properties::read_file(path) {
        Ok(set) => set,
        Err(e) => {
            warn!(error = %e, "Failed to re-read config after write");
            return false;
        }
    };

    if &on_disk == expected {
        return true;
    }

    let mismatched: BTreeSet<&String> = expected
        .keys()
        .chain(on_disk.keys())
        .filter(|k| expected.get(*k) != on_disk.get(*k))
        .collect();
    warn!(path = %path.display(), mismatched = ?mismatched, "Config on disk differs from memory");
    false
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Show only a short prefix of a credential in logs.
fn mask(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}***", prefix)
}
