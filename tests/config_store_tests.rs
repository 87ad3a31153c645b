//! Behavioural tests for the file-backed config store.
//!
//! Covers:
//!   1. Round-trip and placeholder resolution
//!   2. Reload idempotence and discarding unpersisted values
//!   3. Default fallbacks for missing keys and bad values
//!   4. Session token lifecycle
//!   5. Persistence verification and write failures
//!   6. Fallback chain and environment-scoped files
//!   7. One-time loading under concurrent first access

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use brokerage_qa_harness::config::properties;
use brokerage_qa_harness::config::{ConfigSource, ConfigStore, LoadTier, StoreState, SESSION_TOKEN_KEY};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

/// A fixed-path store over a fresh file with `contents`.
fn fixed_store(contents: &str) -> (TempDir, PathBuf, ConfigStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.properties");
    fs::write(&path, contents).unwrap();
    let store = ConfigStore::open(
        ConfigSource::fixed(&path).with_resources_dir(dir.path().join("resources")),
    );
    (dir, path, store)
}

fn env_source(dir: &Path, env: &str) -> ConfigSource {
    ConfigSource::environment(env, dir.join("config")).with_resources_dir(dir.join("resources"))
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

// =============================================================================
// 1. Round-trip
// =============================================================================

#[test]
fn update_then_get_returns_value() {
    let (_dir, _path, store) = fixed_store("a=1\n");

    assert!(store.update("report.title", "Nightly regression"));
    assert_eq!(store.get("report.title").as_deref(), Some("Nightly regression"));
}

#[test]
fn update_with_placeholder_resolves_on_read() {
    let (_dir, _path, store) = fixed_store("api.host=qa.broker.local\n");

    assert!(store.update("api.baseUrl", "https://${api.host}/trading"));
    assert_eq!(
        store.get("api.baseUrl").as_deref(),
        Some("https://qa.broker.local/trading")
    );
    // The raw value is what gets stored.
    assert_eq!(
        store.snapshot().get("api.baseUrl").map(String::as_str),
        Some("https://${api.host}/trading")
    );
}

#[test]
fn unresolved_placeholder_stays_literal() {
    let (_dir, _path, store) = fixed_store("url=${missing.host}/path\n");
    assert_eq!(store.get("url").as_deref(), Some("${missing.host}/path"));
}

#[test]
fn self_referencing_placeholder_terminates() {
    let (_dir, _path, store) = fixed_store("a=${a}\n");
    let value = store.get("a").unwrap();
    assert!(value.contains("${a}"));
}

#[test]
fn resolve_placeholders_on_arbitrary_text() {
    let (_dir, _path, store) = fixed_store("env.name=uat\n");
    assert_eq!(
        store.resolve_placeholders("reports/${env.name}/summary.pdf"),
        "reports/uat/summary.pdf"
    );
}

// =============================================================================
// 2. Reload
// =============================================================================

#[test]
fn reload_twice_is_idempotent() {
    let (_dir, _path, store) = fixed_store("a=1\nb=${a}2\n");

    store.reload();
    let first = store.snapshot();
    store.reload();
    let second = store.snapshot();

    assert_eq!(first, second);
}

#[test]
fn reload_picks_up_external_edits() {
    let (_dir, path, store) = fixed_store("a=1\n");
    fs::write(&path, "a=2\nb=3\n").unwrap();

    store.reload();
    assert_eq!(store.get("a").as_deref(), Some("2"));
    assert_eq!(store.get("b").as_deref(), Some("3"));
    assert_eq!(store.loaded_from(), Some(LoadTier::ExplicitFile));
}

#[test]
fn reload_after_first_write_reports_file_tier() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open(env_source(dir.path(), "uat"));
    assert_eq!(store.loaded_from(), Some(LoadTier::BuiltIn));

    assert!(store.update_session_token("t"));
    store.reload();
    assert_eq!(store.loaded_from(), Some(LoadTier::EnvironmentFile));
    assert_eq!(store.session_token(), "t");
}

#[test]
fn reload_discards_unpersisted_update() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();
    let path = blocker.join("config.properties");

    // Nothing on disk: built-in defaults load, writes fail.
    let store = ConfigStore::open(
        ConfigSource::fixed(&path).with_resources_dir(dir.path().join("resources")),
    );
    assert!(!store.update("only.in.memory", "x"));
    assert_eq!(store.get("only.in.memory").as_deref(), Some("x"));

    store.reload();
    assert!(!store.contains_key("only.in.memory"));
    assert_eq!(store.backing_path(), std::path::absolute(&path).unwrap());
}

// =============================================================================
// 3. Defaults
// =============================================================================

#[test]
fn missing_key_uses_default() {
    let (_dir, _path, store) = fixed_store("a=1\n");
    assert_eq!(store.get("nonexistent.key"), None);
    assert_eq!(store.get_or("nonexistent.key", "D"), "D");
}

#[test]
fn bad_numbers_use_default() {
    let (_dir, _path, store) = fixed_store("bad.key=notanumber\nflag=perhaps\n");
    assert_eq!(store.get_int("bad.key", 7), 7);
    assert_eq!(store.get_long("bad.key", 7), 7);
    assert!(store.get_bool("flag", true));
}

// =============================================================================
// 4. Session token
// =============================================================================

#[test]
fn session_scenario_from_empty_token() {
    let (_dir, path, store) = fixed_store("api.sessionID=\napi.timeout=30000\n");

    assert_eq!(store.session_token(), "");
    assert_eq!(store.timeout_ms(), 30000);

    assert!(store.update_session_token("abc123"));

    // A fresh load from the same file sees the token.
    let fresh = ConfigStore::open(ConfigSource::fixed(&path));
    assert_eq!(fresh.get(SESSION_TOKEN_KEY).as_deref(), Some("abc123"));
    assert_eq!(fresh.session_token(), "abc123");
    assert_eq!(fresh.timeout_ms(), 30000);
}

#[test]
fn clear_session_token_empties_it() {
    let (_dir, path, store) = fixed_store("api.sessionID=abc123\n");

    assert!(store.clear_session_token());
    assert_eq!(store.session_token(), "");

    let on_disk = properties::read_file(&path).unwrap();
    assert_eq!(on_disk.get(SESSION_TOKEN_KEY).map(String::as_str), Some(""));
}

#[test]
fn session_token_missing_key_is_empty() {
    let (_dir, _path, store) = fixed_store("a=1\n");
    assert_eq!(store.session_token(), "");
}

#[test]
fn clones_share_the_session_token() {
    let (_dir, _path, store) = fixed_store("api.sessionID=\n");
    let api_side = store.clone();

    assert!(store.update_session_token("tok-9"));
    assert_eq!(api_side.session_token(), "tok-9");
}

// =============================================================================
// 5. Persistence
// =============================================================================

#[test]
fn persisted_file_contains_value_and_header() {
    let (_dir, path, store) = fixed_store("# hand written\na=1\n");

    assert!(store.update("k", "v"));

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# Updated by brokerage-qa-harness"));
    assert!(lines.next().unwrap().starts_with("# "));
    assert!(text.lines().any(|l| l == "k=v"));
    assert!(text.lines().any(|l| l == "a=1"));
}

#[test]
fn write_failure_returns_false_and_keeps_memory() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the parent directory should be makes directory creation fail.
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let path = blocker.join("sub").join("config.properties");

    let store = ConfigStore::open(
        ConfigSource::fixed(&path).with_resources_dir(dir.path().join("resources")),
    );
    assert!(!store.update("k", "v"));
    assert_eq!(store.get("k").as_deref(), Some("v"));
    assert!(!store.update_session_token("abc"));
    assert_eq!(store.session_token(), "abc");
}

#[test]
fn update_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("config.properties");

    let store = ConfigStore::open(
        ConfigSource::fixed(&path).with_resources_dir(dir.path().join("resources")),
    );
    assert_eq!(store.loaded_from(), Some(LoadTier::BuiltIn));
    assert!(store.update_session_token("abc123"));

    let on_disk = properties::read_file(&path).unwrap();
    assert_eq!(on_disk.get(SESSION_TOKEN_KEY).map(String::as_str), Some("abc123"));
}

#[test]
fn values_with_special_characters_persist() {
    let (_dir, path, store) = fixed_store("");
    let value = " leading space, trailing backslash\\";

    assert!(store.update("odd key=:", value));
    let fresh = ConfigStore::open(ConfigSource::fixed(&path));
    assert_eq!(fresh.get("odd key=:").as_deref(), Some(value));
}

// =============================================================================
// 6. Fallback chain
// =============================================================================

#[test]
fn fixed_path_falls_back_to_bundled_resource() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("resources/suite.properties"), "from=resource\n");

    let store = ConfigStore::open(
        ConfigSource::fixed(dir.path().join("missing/suite.properties"))
            .with_resources_dir(dir.path().join("resources")),
    );
    assert_eq!(store.loaded_from(), Some(LoadTier::BundledResource));
    assert_eq!(store.get("from").as_deref(), Some("resource"));

    // The resource itself is never written; updates go to the explicit path.
    assert!(store.update("k", "v"));
    let resource = properties::read_file(&dir.path().join("resources/suite.properties")).unwrap();
    assert!(!resource.contains_key("k"));
    let explicit = properties::read_file(&dir.path().join("missing/suite.properties")).unwrap();
    assert_eq!(explicit.get("from").map(String::as_str), Some("resource"));
    assert_eq!(explicit.get("k").map(String::as_str), Some("v"));
}

#[test]
fn builtin_defaults_when_nothing_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open(env_source(dir.path(), "qa"));

    assert_eq!(store.loaded_from(), Some(LoadTier::BuiltIn));
    assert_eq!(store.timeout_ms(), 30000);
    assert_eq!(store.session_token(), "");
    assert_eq!(
        store.backing_path(),
        std::path::absolute(dir.path().join("config/config-qa.properties")).unwrap()
    );
}

#[test]
fn builtin_defaults_take_active_environment_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConfigStore::open(env_source(dir.path(), "uat"));

    assert_eq!(store.loaded_from(), Some(LoadTier::BuiltIn));
    assert_eq!(store.environment_name(), "uat");

    assert!(store.update_session_token("t"));
    let on_disk = properties::read_file(&dir.path().join("config/config-uat.properties")).unwrap();
    assert!(!on_disk.contains_key("env.name"));

    let fresh = ConfigStore::open(env_source(dir.path(), "uat"));
    assert_eq!(fresh.environment_name(), "uat");
}

#[test]
fn environment_file_preferred_over_default_file() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("config/config-uat.properties"), "which=uat\n");
    write(&dir.path().join("config/config.properties"), "which=default\n");

    let store = ConfigStore::open(env_source(dir.path(), "uat"));
    assert_eq!(store.loaded_from(), Some(LoadTier::EnvironmentFile));
    assert_eq!(store.get("which").as_deref(), Some("uat"));
}

#[test]
fn environment_falls_back_to_default_file() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("config/config.properties"), "which=default\n");

    let store = ConfigStore::open(env_source(dir.path(), "prod"));
    assert_eq!(store.loaded_from(), Some(LoadTier::DefaultFile));
    assert_eq!(store.get("which").as_deref(), Some("default"));

    // Updates go back to the file that was loaded.
    assert!(store.update("k", "v"));
    let on_disk = properties::read_file(&dir.path().join("config/config.properties")).unwrap();
    assert_eq!(on_disk.get("k").map(String::as_str), Some("v"));
}

#[test]
fn environment_falls_back_to_bundled_resource() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("resources/config-dev.properties"), "which=bundled\n");

    let store = ConfigStore::open(env_source(dir.path(), "dev"));
    assert_eq!(store.loaded_from(), Some(LoadTier::BundledResource));
    assert_eq!(store.get("which").as_deref(), Some("bundled"));
}

#[test]
fn switch_environment_reloads_other_file() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("config/config-qa.properties"), "which=qa\n");
    write(&dir.path().join("config/config-uat.properties"), "which=uat\n");

    let store = ConfigStore::open(env_source(dir.path(), "qa"));
    assert_eq!(store.get("which").as_deref(), Some("qa"));

    assert!(store.switch_environment("UAT"));
    assert_eq!(store.get("which").as_deref(), Some("uat"));
    assert_eq!(store.environment_name(), "uat");
    assert_eq!(store.state(), StoreState::Loaded);
}

#[test]
fn load_retargets_store() {
    let (dir, _path, store) = fixed_store("which=first\n");
    let second = dir.path().join("second.properties");
    fs::write(&second, "which=second\n").unwrap();

    store.load(&second);
    assert_eq!(store.get("which").as_deref(), Some("second"));
    assert_eq!(store.backing_path(), std::path::absolute(&second).unwrap());
}

// =============================================================================
// 7. Concurrency
// =============================================================================

#[test]
fn concurrent_first_access_loads_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.properties");
    fs::write(&path, "api.sessionID=shared\n").unwrap();

    let store = ConfigStore::new(ConfigSource::fixed(&path));
    assert_eq!(store.state(), StoreState::Unloaded);

    let store = Arc::new(store);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.session_token())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "shared");
    }
    assert_eq!(store.state(), StoreState::Loaded);
    assert_eq!(store.loaded_from(), Some(LoadTier::ExplicitFile));
}

#[test]
fn sequential_updates_from_threads_all_persist() {
    let (_dir, path, store) = fixed_store("");

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || store.update(&format!("worker.{i}"), &i.to_string()))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }

    let on_disk = properties::read_file(&path).unwrap();
    for i in 0..4 {
        assert_eq!(on_disk.get(&format!("worker.{i}")), Some(&i.to_string()));
    }
}
