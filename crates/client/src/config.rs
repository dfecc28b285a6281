//! Client configuration.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BACKEND_API_BASE` | Base URL of the auction backend | `https://pb-backend.generalmagic.io/api` |
//! | `SHUTTER_API_BASE` | Base URL of the encryption network API | Chiado staging |
//! | `REQUIRE_EMAIL` | Require an email-shaped contact | `false` |
//! | `REQUEST_TIMEOUT_SECS` | Per-request HTTP timeout | `30` |

use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "https://pb-backend.generalmagic.io/api";
pub const DEFAULT_SHUTTER_URL: &str = "https://shutter-api.chiado.staging.shutter.network/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const BACKEND_URL_ENV: &str = "BACKEND_API_BASE";
pub const SHUTTER_URL_ENV: &str = "SHUTTER_API_BASE";
pub const REQUIRE_EMAIL_ENV: &str = "REQUIRE_EMAIL";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";

/// Endpoints and submission rules for the bidder client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub shutter_url: String,
    /// Whether the contact field must be an email address
    pub require_email: bool,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            shutter_url: DEFAULT_SHUTTER_URL.to_string(),
            require_email: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load overrides through an arbitrary lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            backend_url: non_empty(BACKEND_URL_ENV).unwrap_or(defaults.backend_url),
            shutter_url: non_empty(SHUTTER_URL_ENV).unwrap_or(defaults.shutter_url),
            require_email: non_empty(REQUIRE_EMAIL_ENV)
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.require_email),
            request_timeout_secs: non_empty(REQUEST_TIMEOUT_ENV)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
