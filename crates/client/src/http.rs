//! Shared HTTP plumbing for the encryption network and backend clients.

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

/// JSON fields that may carry a human-readable error, in priority order.
const MESSAGE_FIELDS: [&str; 3] = ["message", "error", "description"];

pub(crate) fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Pull a human-readable error out of a response body.
///
/// A JSON object yields its first string `message`, `error` or `description`
/// field; a JSON string yields itself; any other non-empty body that is not
/// JSON is returned as-is.
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => MESSAGE_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        Ok(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Status code and extracted message of a failed response.
pub(crate) async fn error_parts(response: Response) -> (u16, Option<String>) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, extract_message(&body))
}
