//! Session authentication for the trading backend.
//!
//! After a successful login the backend issues an opaque session id. It is
//! stored in the [`ConfigStore`] and read back before every authenticated
//! request, which sends three headers:
//! - Authorization: `Bearer <session id>`
//! - X-Session-Id: the session id itself
//! - X-Request-Id: a fresh UUID for log correlation

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::keys;
use crate::config::ConfigStore;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Session token is not set; log in first")]
    MissingSessionToken,
    #[error("Username is required")]
    MissingUsername,
    #[error("Password is required")]
    MissingPassword,
    #[error("Invalid header value for {name}")]
    InvalidHeader { name: &'static str },
}

/// Login payload. `nin` is the client's National Identification Number.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nin: Option<String>,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Result<Self, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::MissingUsername);
        }
        if password.is_empty() {
            return Err(AuthError::MissingPassword);
        }
        Ok(Self {
            username: username.trim().to_string(),
            password: password.to_string(),
            nin: None,
        })
    }

    pub fn with_nin(mut self, nin: &str) -> Self {
        let nin = nin.trim();
        self.nin = (!nin.is_empty()).then(|| nin.to_string());
        self
    }

    /// Read `api.username`, `api.password` and `api.nin` from the store.
    pub fn from_store(store: &ConfigStore) -> Result<Self, AuthError> {
        let creds = Self::new(
            &store.get_or(keys::USERNAME, ""),
            &store.get_or(keys::PASSWORD, ""),
        )?;
        Ok(creds.with_nin(&store.get_or(keys::NIN, "")))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("nin", &self.nin)
            .finish()
    }
}

/// Session credential for one request.
#[derive(Clone)]
pub struct SessionAuth {
    token: String,
}

impl SessionAuth {
    pub fn new(token: &str) -> Result<Self, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingSessionToken);
        }
        Ok(Self {
            token: token.to_string(),
        })
    }

    /// Read the current session token from the store.
    pub fn from_store(store: &ConfigStore) -> Result<Self, AuthError> {
        Self::new(&store.session_token())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Headers for an authenticated request.
    pub fn headers(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = base_headers();
        headers.insert(
            AUTHORIZATION,
            header_value("Authorization", &format!("Bearer {}", self.token))?,
        );
        headers.insert("X-Session-Id", header_value("X-Session-Id", &self.token)?);
        Ok(headers)
    }
}

impl std::fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.token.chars().take(4).collect();
        f.debug_struct("SessionAuth")
            .field("token", &format!("{}***", prefix))
            .finish()
    }
}

/// Headers sent on every request, authenticated or not.
pub fn base_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    // A hyphenated UUID is always a valid header value.
    if let Ok(id) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        headers.insert("X-Request-Id", id);
    }
    headers
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeader { name })
}
