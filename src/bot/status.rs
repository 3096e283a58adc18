//! WhatsApp ban-status lookup against a configurable HTTP endpoint.
//!
//! Providers answer in different shapes, so every response is folded into a
//! `CheckResult`. Failures become `status: "error"` results rather than errors.

use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(12);

/// Max chars of an unrecognised 200 body kept as details.
const MAX_BODY_DETAILS: usize = 1000;

/// Max chars of an error body kept as details.
const MAX_ERROR_DETAILS: usize = 300;

/// Normalized outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: String,
    pub details: String,
}

impl CheckResult {
    fn new(status: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            details: details.into(),
        }
    }

    fn error(details: impl Into<String>) -> Self {
        Self::new("error", details)
    }
}

pub struct StatusClient {
    url: Option<String>,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl StatusClient {
    pub fn new(url: Option<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self { url, api_key, http })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Look up `number`. Never fails; problems are reported in the result.
    pub async fn check_status(&self, number: &str) -> CheckResult {
        let Some(ref url) = self.url else {
            return CheckResult::new("unknown", "not configured");
        };

        info!("🔎 Looking up {}", number);

        let mut request = self.http.get(url).query(&[("number", number)]);
        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key.as_str())]).bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Status lookup failed: {e}");
                return CheckResult::error(format!("Request failed: {e}"));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to read status response: {e}");
                return CheckResult::error(format!("Failed to read response: {e}"));
            }
        };

        let result = normalize(status.as_u16(), &body);
        info!("Lookup for {} → {}", number, result.status);
        result
    }
}

/// Fold an HTTP status and body into a `CheckResult`.
pub fn normalize(status_code: u16, body: &str) -> CheckResult {
    if status_code != 200 {
        return CheckResult::error(format!(
            "API returned {}: {}",
            status_code,
            truncate_chars(body, MAX_ERROR_DETAILS)
        ));
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        let stringified = Value::Object(map.clone()).to_string();

        if let Some(banned) = map.get("banned") {
            let status = if is_truthy(banned) { "BANNED" } else { "ACTIVE" };
            let details = match map.get("reason") {
                Some(reason) => value_to_text(reason),
                None => stringified,
            };
            return CheckResult::new(status, details);
        }

        if let Some(status) = map.get("status") {
            return CheckResult::new(value_to_text(status), stringified);
        }
    }

    CheckResult::new("UNKNOWN", truncate_chars(body, MAX_BODY_DETAILS))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strings verbatim, everything else as compact JSON.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
