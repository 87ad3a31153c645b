//! API error types for the trading backend client.

use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {status_code} - {message}")]
    Http {
        status_code: u16,
        error_code: String,
        message: String,
    },

    #[error("Rate limited (retry after {retry_after}s)")]
    RateLimited { retry_after: u64 },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Session error: {0}")]
    Session(#[from] AuthError),

    #[error("Client not found: {0}")]
    UnknownClient(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl ApiError {
    /// Parse error from API response JSON.
    pub fn from_response(status_code: u16, body: &str) -> Self {
        // Try to parse structured error response.
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
            let error = json.get("error").filter(|v| v.is_object()).unwrap_or(&json);
            let code = error
                .get("code")
                .or_else(|| error.get("errorCode"))
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            let message = error
                .get("message")
                .or_else(|| error.get("errorMessage"))
                .and_then(|v| v.as_str())
                .unwrap_or(body)
                .to_string();

            return match code.as_str() {
                "INVALID_SESSION" | "SESSION_EXPIRED" | "INVALID_CREDENTIALS" => {
                    Self::Authentication(message)
                }
                "CLIENT_NOT_FOUND" | "INVALID_NIN" => Self::UnknownClient(message),
                "RATE_LIMITED" => Self::RateLimited { retry_after: 1 },
                _ if matches!(status_code, 401 | 403) => Self::Authentication(message),
                _ => Self::Http {
                    status_code,
                    error_code: code,
                    message,
                },
            };
        }

        if matches!(status_code, 401 | 403) {
            return Self::Authentication(body.to_string());
        }

        Self::Http {
            status_code,
            error_code: "UNKNOWN".to_string(),
            message: body.to_string(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Network(_)
                | Self::Timeout(_)
                | Self::Http {
                    status_code: 500..=599,
                    ..
                }
        )
    }
}
