//! Calendar provider abstraction.
//!
//! The notifier and the setup tools talk to Google through this trait so that token
//! mechanics and HTTP stay behind one adapter ([`crate::google::GoogleCalendarClient`]).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::credentials::Credential;
use crate::schedule::{CalendarEvent, DayWindow};
use crate::webhook::{WatchRequest, WatchResponse};
use crate::{Error, Result};

/// Access token returned by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: Option<i64>,
}

/// Calendar visible to the authorized account.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarSummary {
    pub id: String,
    pub summary: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

/// Operations the relay needs from a calendar provider.
#[allow(async_fn_in_trait)]
pub trait CalendarProvider {
    /// Exchange the credential's refresh token for a new access token.
    async fn refresh_access_token(&self, credential: &Credential) -> Result<RefreshedToken>;

    /// Events overlapping `window`, recurring events expanded, ordered by start time.
    async fn list_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        window: &DayWindow,
    ) -> Result<Vec<CalendarEvent>>;

    async fn list_calendars(&self, credential: &Credential) -> Result<Vec<CalendarSummary>>;

    /// Open a push-notification channel for changes to a calendar's events.
    async fn watch_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        request: &WatchRequest,
    ) -> Result<WatchResponse>;
}

/// Make sure a credential is usable for calendar reads, refreshing it if needed.
pub async fn authorize<P: CalendarProvider>(
    provider: &P,
    mut credential: Credential,
    now: DateTime<Utc>,
) -> Result<Credential> {
    if !credential.authorizes_calendar_read() {
        return Err(Error::CredentialInvalid(
            "granted scopes do not include calendar read access".to_string(),
        ));
    }

    if credential.is_valid(now) {
        return Ok(credential);
    }

    if !credential.can_refresh() {
        return Err(Error::CredentialInvalid(
            "access token expired and no refresh token available".to_string(),
        ));
    }

    info!("Access token expired, refreshing");

    let refreshed = provider
        .refresh_access_token(&credential)
        .await
        .map_err(|e| match e {
            Error::Transport(_) => e,
            other => Error::CredentialInvalid(format!("token refresh failed: {}", other)),
        })?;

    credential.apply_refresh(refreshed.access_token, refreshed.expires_in, now);
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{credential, FakeProvider};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 7, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_valid_credential_is_not_refreshed() {
        let provider = FakeProvider::default();
        let creds = authorize(&provider, credential(), now()).await.unwrap();

        assert_eq!(creds.token.as_deref(), Some("access-token"));
        assert_eq!(provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed() {
        let provider = FakeProvider::default();
        let mut expired = credential();
        expired.expiry = Some(now() - Duration::hours(1));

        let creds = authorize(&provider, expired, now()).await.unwrap();

        assert_eq!(creds.token.as_deref(), Some("refreshed-token"));
        assert_eq!(creds.expiry, Some(now() + Duration::seconds(3599)));
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_is_invalid() {
        let provider = FakeProvider::default();
        let mut expired = credential();
        expired.expiry = Some(now() - Duration::hours(1));
        expired.refresh_token = None;

        let result = authorize(&provider, expired, now()).await;
        assert!(matches!(result, Err(Error::CredentialInvalid(_))));
        assert_eq!(provider.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_invalid_credential() {
        let provider = FakeProvider {
            refresh_fails: true,
            ..FakeProvider::default()
        };
        let mut expired = credential();
        expired.token = None;

        let result = authorize(&provider, expired, now()).await;
        assert!(matches!(result, Err(Error::CredentialInvalid(_))));
    }

    #[tokio::test]
    async fn test_wrong_scopes_are_rejected() {
        let provider = FakeProvider::default();
        let mut creds = credential();
        creds.scopes = Some(vec!["https://www.googleapis.com/auth/gmail.readonly".to_string()]);

        let result = authorize(&provider, creds, now()).await;
        assert!(matches!(result, Err(Error::CredentialInvalid(_))));
    }
}
