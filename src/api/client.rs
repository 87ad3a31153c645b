//! Async REST client for the brokerage trading backend.
//!
//! Features:
//! - Session-token authentication read from the shared [`ConfigStore`]
//! - Rate limiting (configurable, default 10 req/sec)
//! - Automatic retries with exponential backoff
//! - Typed responses
//!
//! Base URL, timeout, retry count and endpoint paths all come from the
//! store, so one config file drives every test run.

use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::{base_headers, Credentials, SessionAuth};
use crate::config::ConfigStore;

use super::errors::ApiError;
use super::models::*;

/// Logical endpoints and their default paths. Override any of them with
/// `api.endpoint.<name>` in the config file.
pub const LOGIN: (&str, &str) = ("login", "/api/v1/auth/login");
pub const BANK_BALANCE: (&str, &str) = ("bankBalance", "/api/v1/customer/bank-balance");
pub const CUSTOMER_ASSETS: (&str, &str) = ("customerAssets", "/api/v1/customer/assets");
pub const ALERTS: (&str, &str) = ("alerts", "/api/v1/alerts");
pub const MARGIN_ALLOWANCE: (&str, &str) = ("marginAllowance", "/api/v1/margin/allowance");

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Async REST client for the trading backend.
pub struct TradingClient {
    store: ConfigStore,
    base_url: String,
    client: Client,
    rate_limiter: Arc<DirectLimiter>,
    max_retries: u32,
}

impl TradingClient {
    pub fn new(
        store: ConfigStore,
        base_url: &str,
        rate_limit: u32,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(20)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota = Quota::per_second(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            store,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            rate_limiter,
            max_retries: max_retries.max(1),
        })
    }

    /// Create from the store's `api.baseUrl`, `api.timeout` and
    /// `api.retryAttempts`.
    pub fn from_store(store: ConfigStore) -> Result<Self, ApiError> {
        let base_url = store.base_url();
        let timeout = store.timeout();
        let retries = u32::try_from(store.retry_attempts()).unwrap_or(1);
        Self::new(store, &base_url, 10, retries, timeout)
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Configured path for an endpoint, or its default.
    pub fn endpoint_path(&self, endpoint: (&str, &str)) -> String {
        let (name, default) = endpoint;
        let configured = self.store.endpoint_url(name);
        if configured.trim().is_empty() {
            default.to_string()
        } else {
            configured
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        authenticated: bool,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(path);
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.max_retries {
            // Rate limiting
            self.rate_limiter.until_ready().await;

            // Re-read the session token each attempt; a parallel login may
            // have replaced it.
            let headers = if authenticated {
                SessionAuth::from_store(&self.store)?.headers()?
            } else {
                base_headers()
            };

            debug!(
                method = %method,
                path = %path,
                attempt = attempt + 1,
                "API request"
            );

            let mut req = self.client.request(method.clone(), &url).headers(headers);
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let text = response
                            .text()
                            .await
                            .map_err(|e| ApiError::Network(e.to_string()))?;
                        if text.trim().is_empty() {
                            return Ok(Value::Null);
                        }
                        return serde_json::from_str(&text)
                            .map_err(|e| ApiError::Deserialization(e.to_string()));
                    }

                    // Rate limit — always retry
                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        warn!(retry_after, attempt = attempt + 1, "Rate limited");
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        last_error = Some(ApiError::RateLimited { retry_after });
                        continue;
                    }

                    let status_code = status.as_u16();
                    let body_text = response.text().await.unwrap_or_default();
                    let error = ApiError::from_response(status_code, &body_text);

                    // Client errors — don't retry
                    if !status.is_server_error() || !error.is_retryable() {
                        return Err(error);
                    }

                    // Server errors — retry with backoff
                    let delay_ms = backoff_ms(attempt);
                    warn!(
                        status_code,
                        delay_ms,
                        attempt = attempt + 1,
                        error = %error,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_error = Some(error);
                    continue;
                }
                Err(e) => {
                    let error = if e.is_timeout() {
                        ApiError::Timeout(e.to_string())
                    } else {
                        ApiError::Network(e.to_string())
                    };
                    let delay_ms = backoff_ms(attempt);
                    warn!(
                        error = %error,
                        delay_ms,
                        attempt = attempt + 1,
                        "Network error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_error = Some(error);
                    continue;
                }
            }
        }

        Err(ApiError::MaxRetriesExceeded {
            attempts: self.max_retries,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    // =========================================================================
    // Session Endpoints
    // =========================================================================

    /// Log in and persist the issued session token.
    ///
    /// Returns the token. A successful response without a token is an
    /// authentication error. A token that could not be persisted is still
    /// usable in this process, so only a warning is logged.
    pub async fn login(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let body = serde_json::to_value(credentials)
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let path = self.endpoint_path(LOGIN);

        let data = self
            .request(reqwest::Method::POST, &path, Some(&body), false)
            .await?;

        let token = extract_session_token(&data).ok_or_else(|| {
            ApiError::Authentication("login response did not contain a session id".to_string())
        })?;

        if !self.store.update_session_token(&token) {
            warn!(
                path = %self.store.backing_path().display(),
                "Session token not persisted; later runs will need to log in again"
            );
        }
        info!(username = %credentials.username, "Logged in");
        Ok(token)
    }

    /// Forget the current session.
    pub fn logout(&self) -> bool {
        self.store.clear_session_token()
    }

    // =========================================================================
    // Customer Endpoints
    // =========================================================================

    /// Bank balance for a client NIN.
    pub async fn bank_balance(&self, nin: &str) -> Result<BankBalance, ApiError> {
        let data = self.post_for_nin(BANK_BALANCE, nin).await?;
        let mut balance: BankBalance = serde_json::from_value(unwrap_envelope(&data).clone())
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        if balance.nin.is_empty() {
            balance.nin = nin.to_string();
        }
        Ok(balance)
    }

    /// Holdings for a client NIN.
    pub async fn customer_assets(&self, nin: &str) -> Result<Vec<CustomerAsset>, ApiError> {
        let data = self.post_for_nin(CUSTOMER_ASSETS, nin).await?;
        Ok(parse_list(&data, &["assets", "holdings", "positions"]))
    }

    /// Price alerts registered for a client NIN.
    pub async fn alerts(&self, nin: &str) -> Result<Vec<Alert>, ApiError> {
        let data = self.post_for_nin(ALERTS, nin).await?;
        Ok(parse_list(&data, &["alerts"]))
    }

    /// Margin allowance for a client NIN.
    pub async fn margin_allowance(&self, nin: &str) -> Result<MarginAllowance, ApiError> {
        let data = self.post_for_nin(MARGIN_ALLOWANCE, nin).await?;
        let mut margin: MarginAllowance = serde_json::from_value(unwrap_envelope(&data).clone())
            .map_err(|e| ApiError::Deserialization(e.to_string()))?;
        if margin.nin.is_empty() {
            margin.nin = nin.to_string();
        }
        Ok(margin)
    }

    async fn post_for_nin(&self, endpoint: (&str, &str), nin: &str) -> Result<Value, ApiError> {
        let nin = nin.trim();
        if nin.is_empty() {
            return Err(ApiError::UnknownClient("empty NIN".to_string()));
        }
        let path = self.endpoint_path(endpoint);
        let body = json!({ "nin": nin });
        self.request(reqwest::Method::POST, &path, Some(&body), true)
            .await
    }
}

fn backoff_ms(attempt: u32) -> u64 {
    500 * 2u64.pow(attempt.min(10))
}
