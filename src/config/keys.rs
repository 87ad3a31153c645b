//! Reserved keys and their typed accessors.

use std::path::PathBuf;
use std::time::Duration;

use super::source::DEFAULT_ENVIRONMENT;
use super::store::ConfigStore;

pub const BASE_URL: &str = "api.baseUrl";
pub const ENDPOINT_PREFIX: &str = "api.endpoint.";
pub const TIMEOUT_MS: &str = "api.timeout";
pub const RETRY_ATTEMPTS: &str = "api.retryAttempts";
pub const USERNAME: &str = "api.username";
pub const PASSWORD: &str = "api.password";
pub const NIN: &str = "api.nin";
pub const SCREENSHOT_DIR: &str = "screenshot.dir";
pub const IMPLICIT_WAIT: &str = "wait.implicit";
pub const EXPLICIT_WAIT: &str = "wait.explicit";
pub const PAGE_LOAD_TIMEOUT: &str = "wait.pageLoad";
pub const THREAD_COUNT: &str = "test.threadCount";
pub const ENVIRONMENT_NAME: &str = "env.name";
pub const BROWSER: &str = "browser.name";
pub const HEADLESS: &str = "browser.headless";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_RETRY_ATTEMPTS: i32 = 3;
pub const DEFAULT_SCREENSHOT_DIR: &str = "target/screenshots";
pub const DEFAULT_IMPLICIT_WAIT_SECS: i64 = 10;
pub const DEFAULT_EXPLICIT_WAIT_SECS: i64 = 20;
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: i64 = 60;
pub const DEFAULT_THREAD_COUNT: i32 = 1;
pub const DEFAULT_BROWSER: &str = "chrome";

impl ConfigStore {
    pub fn base_url(&self) -> String {
        self.get_or(BASE_URL, DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Endpoint path configured under `api.endpoint.<name>`, or `""`.
    pub fn endpoint_url(&self, name: &str) -> String {
        self.get_or(&format!("{}{}", ENDPOINT_PREFIX, name), "")
    }

    pub fn timeout_ms(&self) -> i64 {
        self.get_long(TIMEOUT_MS, DEFAULT_TIMEOUT_MS)
    }

    /// Request timeout. Zero or negative values mean the default.
    pub fn timeout(&self) -> Duration {
        let ms = match self.timeout_ms() {
            ms if ms > 0 => ms,
            _ => DEFAULT_TIMEOUT_MS,
        };
        Duration::from_millis(ms.unsigned_abs())
    }

    pub fn retry_attempts(&self) -> i32 {
        self.get_int(RETRY_ATTEMPTS, DEFAULT_RETRY_ATTEMPTS)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        PathBuf::from(self.get_or(SCREENSHOT_DIR, DEFAULT_SCREENSHOT_DIR))
    }

    pub fn implicit_wait_secs(&self) -> i64 {
        self.get_long(IMPLICIT_WAIT, DEFAULT_IMPLICIT_WAIT_SECS)
    }

    pub fn explicit_wait_secs(&self) -> i64 {
        self.get_long(EXPLICIT_WAIT, DEFAULT_EXPLICIT_WAIT_SECS)
    }

    pub fn page_load_timeout_secs(&self) -> i64 {
        self.get_long(PAGE_LOAD_TIMEOUT, DEFAULT_PAGE_LOAD_TIMEOUT_SECS)
    }

    pub fn thread_count(&self) -> i32 {
        self.get_int(THREAD_COUNT, DEFAULT_THREAD_COUNT)
    }

    /// `env.name`, else the active environment, else `qa`.
    pub fn environment_name(&self) -> String {
        self.get(ENVIRONMENT_NAME)
            .filter(|v| !v.is_empty())
            .or_else(|| self.source().environment_name().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }

    pub fn browser(&self) -> String {
        self.get_or(BROWSER, DEFAULT_BROWSER).to_lowercase()
    }

    pub fn headless(&self) -> bool {
        self.get_bool(HEADLESS, false)
    }
}
