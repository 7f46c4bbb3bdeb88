//! Google OAuth credential bundle and its portable base64 JSON encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CREDENTIALS_ENV;
use crate::{Error, Result};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
pub const EVENTS_READONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/calendar.events.readonly";

/// Scopes requested by the credential generator.
pub const SCOPES: &[&str] = &[CALENDAR_READONLY_SCOPE, EVENTS_READONLY_SCOPE];

/// Any of these lets us read events.
const READ_SCOPES: &[&str] = &[
    CALENDAR_READONLY_SCOPE,
    EVENTS_READONLY_SCOPE,
    "https://www.googleapis.com/auth/calendar",
    "https://www.googleapis.com/auth/calendar.events",
];

/// Access tokens are treated as expired slightly early so they don't lapse mid-request.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth token bundle in Google's "authorized user" JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Granted scopes; absent in some hand-made blobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// Access token expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Credential {
    /// Decode a base64 JSON blob.
    pub fn decode(blob: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(blob.trim())
            .map_err(|e| Error::CredentialInvalid(format!("not valid base64: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::CredentialInvalid(format!("not a valid credential JSON: {}", e)))
    }

    /// Encode as base64 JSON.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Parse the contents of `lambda_credentials.txt`.
    ///
    /// Accepts either `GOOGLE_CALENDAR_CREDENTIALS=<base64>` or the bare blob.
    pub fn from_env_file(contents: &str) -> Result<Self> {
        let line = contents.trim();
        let blob = line
            .strip_prefix(CREDENTIALS_ENV)
            .and_then(|rest| rest.strip_prefix('='))
            .unwrap_or(line);

        Self::decode(blob)
    }

    /// Render the `KEY=value` line stored in `lambda_credentials.txt`.
    pub fn to_env_line(&self) -> Result<String> {
        Ok(format!("{}={}", CREDENTIALS_ENV, self.encode()?))
    }

    /// Token present and not expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty()) && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|expiry| expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the granted scopes allow reading calendar events.
    ///
    /// A blob without a `scopes` field is assumed to carry the default read scopes.
    pub fn authorizes_calendar_read(&self) -> bool {
        match &self.scopes {
            None => true,
            Some(scopes) => scopes.iter().any(|s| READ_SCOPES.contains(&s.as_str())),
        }
    }

    /// Replace the access token after a refresh.
    pub fn apply_refresh(
        &mut self,
        access_token: String,
        expires_in: Option<i64>,
        now: DateTime<Utc>,
    ) {
        self.token = Some(access_token);
        self.expiry = expires_in.map(|secs| now + Duration::seconds(secs));
    }

    /// Bearer token for API calls.
    pub fn access_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::CredentialInvalid("no access token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Credential {
        Credential {
            token: Some("ya29.access".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            scopes: Some(SCOPES.iter().map(|s| s.to_string()).collect()),
            expiry: None,
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let creds = sample();
        let decoded = Credential::decode(&creds.encode().unwrap()).unwrap();
        assert_eq!(decoded, creds);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Credential::decode("%%% not base64 %%%"),
            Err(Error::CredentialInvalid(_))
        ));

        let not_json = STANDARD.encode("hello world");
        assert!(matches!(
            Credential::decode(&not_json),
            Err(Error::CredentialInvalid(_))
        ));
    }

    #[test]
    fn test_decode_blob_without_expiry_or_token_uri() {
        let json = r#"{"token":"t","refresh_token":"r","client_id":"c","client_secret":"s","scopes":["https://www.googleapis.com/auth/calendar.readonly"]}"#;
        let creds = Credential::decode(&STANDARD.encode(json)).unwrap();
        assert_eq!(creds.token_uri, DEFAULT_TOKEN_URI);
        assert!(creds.expiry.is_none());
        assert!(creds.is_valid(Utc::now()));
    }

    #[test]
    fn test_env_file_line() {
        let creds = sample();
        let line = creds.to_env_line().unwrap();
        assert!(line.starts_with("GOOGLE_CALENDAR_CREDENTIALS="));
        assert_eq!(Credential::from_env_file(&format!("{}\n", line)).unwrap(), creds);
        assert_eq!(
            Credential::from_env_file(&creds.encode().unwrap()).unwrap(),
            creds
        );
    }

    #[test]
    fn test_expiry_and_refresh() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let mut creds = sample();
        creds.expiry = Some(now - Duration::minutes(5));

        assert!(creds.is_expired(now));
        assert!(!creds.is_valid(now));
        assert!(creds.can_refresh());

        creds.apply_refresh("fresh".to_string(), Some(3600), now);
        assert_eq!(creds.access_token().unwrap(), "fresh");
        assert_eq!(creds.expiry, Some(now + Duration::hours(1)));
        assert!(creds.is_valid(now));
    }

    #[test]
    fn test_scope_check() {
        let mut creds = sample();
        assert!(creds.authorizes_calendar_read());

        creds.scopes = Some(vec!["https://www.googleapis.com/auth/drive".to_string()]);
        assert!(!creds.authorizes_calendar_read());

        creds.scopes = None;
        assert!(creds.authorizes_calendar_read());
    }
}
