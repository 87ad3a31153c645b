//! Wire models for the trading backend.
//!
//! Responses come either flat or wrapped in a `data` envelope; numeric
//! amounts arrive as JSON numbers or strings. Decimal fields accept both.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unwrap `{"data": {...}}` / `{"result": {...}}` envelopes.
pub fn unwrap_envelope(value: &Value) -> &Value {
    value
        .get("data")
        .or_else(|| value.get("result"))
        .filter(|v| v.is_object() || v.is_array())
        .unwrap_or(value)
}

/// Field names the backend has used for the session id.
const SESSION_FIELDS: &[&str] = &["sessionID", "sessionId", "session_id", "token", "accessToken"];

/// Find the session id in a login response.
pub fn extract_session_token(response: &Value) -> Option<String> {
    let body = unwrap_envelope(response);
    [body, response]
        .into_iter()
        .flat_map(|v| SESSION_FIELDS.iter().filter_map(move |f| v.get(*f)))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Account Models
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankBalance {
    #[serde(alias = "NIN")]
    pub nin: String,
    pub currency: String,
    #[serde(alias = "availableBalance")]
    pub available: Decimal,
    #[serde(alias = "blockedAmount")]
    pub blocked: Decimal,
    #[serde(alias = "totalBalance")]
    pub total: Decimal,
}

impl BankBalance {
    /// Funds usable for a new order.
    pub fn usable(&self) -> Decimal {
        (self.available - self.blocked).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerAsset {
    #[serde(alias = "symbolCode")]
    pub symbol: String,
    pub quantity: Decimal,
    #[serde(alias = "avgPrice")]
    pub average_price: Decimal,
    pub market_value: Decimal,
}

impl CustomerAsset {
    pub fn cost_basis(&self) -> Decimal {
        self.average_price * self.quantity
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.market_value - self.cost_basis()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
    #[serde(alias = "alertId")]
    pub id: String,
    pub symbol: String,
    pub condition: String,
    #[serde(alias = "targetPrice")]
    pub price: Decimal,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarginAllowance {
    #[serde(alias = "NIN")]
    pub nin: String,
    #[serde(alias = "marginLimit")]
    pub allowance: Decimal,
    #[serde(alias = "usedMargin")]
    pub used: Decimal,
}

impl MarginAllowance {
    pub fn remaining(&self) -> Decimal {
        (self.allowance - self.used).max(Decimal::ZERO)
    }
}

/// Collect a list from a response: a bare array, an array under one of
/// `keys`, or the same inside a `data` envelope. Unparseable entries are
/// skipped.
pub fn parse_list<T>(response: &Value, keys: &[&str]) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    let body = unwrap_envelope(response);
    let entries = match body {
        Value::Array(arr) => arr.clone(),
        _ => keys
            .iter()
            .find_map(|k| body.get(*k).and_then(|v| v.as_array()))
            .cloned()
            .unwrap_or_default(),
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable entry");
                None
            }
        })
        .collect()
}
