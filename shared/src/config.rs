//! Configuration management for the relay and its setup tools.

use std::env;

/// Environment variable holding the base64 JSON credential blob.
pub const CREDENTIALS_ENV: &str = "GOOGLE_CALENDAR_CREDENTIALS";
/// Pushover application token.
pub const PUSHOVER_TOKEN_ENV: &str = "PUSHOVER_TOKEN";
/// Pushover user (recipient) key.
pub const PUSHOVER_USER_ENV: &str = "PUSHOVER_USER";
/// Optional calendar id override.
pub const CALENDAR_ID_ENV: &str = "GOOGLE_CALENDAR_ID";

/// File written by the credential generator and read by the webhook registrar.
pub const CREDENTIALS_FILE: &str = "lambda_credentials.txt";
/// Record of the active webhook channel.
pub const WEBHOOK_INFO_FILE: &str = "webhook_info.json";

pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Notifier configuration loaded from environment variables.
///
/// Every field is optional at load time; the notifier degrades instead of failing.
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    /// Base64 JSON credential blob
    pub credentials_blob: Option<String>,
    /// Pushover application token
    pub pushover_token: Option<String>,
    /// Pushover user key
    pub pushover_user: Option<String>,
    /// Calendar to read
    pub calendar_id: String,
}

impl NotifierConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            credentials_blob: non_empty_var(CREDENTIALS_ENV),
            pushover_token: non_empty_var(PUSHOVER_TOKEN_ENV),
            pushover_user: non_empty_var(PUSHOVER_USER_ENV),
            calendar_id: calendar_id_from_env(),
        }
    }
}

/// Calendar to read and watch: `GOOGLE_CALENDAR_ID`, or the primary calendar.
pub fn calendar_id_from_env() -> String {
    non_empty_var(CALENDAR_ID_ENV).unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
