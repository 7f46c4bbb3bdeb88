//! In-process fakes shared by the unit tests.

use std::sync::Mutex;

use crate::credentials::{Credential, DEFAULT_TOKEN_URI, SCOPES};
use crate::google::classify_provider_error;
use crate::provider::{CalendarProvider, CalendarSummary, RefreshedToken};
use crate::pushover::PushSender;
use crate::schedule::{CalendarEvent, DayWindow, NotificationMessage};
use crate::webhook::{WatchRequest, WatchResponse};
use crate::{Error, Result};

pub fn credential() -> Credential {
    Credential {
        token: Some("access-token".to_string()),
        refresh_token: Some("refresh-token".to_string()),
        token_uri: DEFAULT_TOKEN_URI.to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        scopes: Some(SCOPES.iter().map(|s| s.to_string()).collect()),
        expiry: None,
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub events: Vec<CalendarEvent>,
    pub calendars: Vec<CalendarSummary>,
    pub refresh_fails: bool,
    pub list_error: Option<String>,
    pub watch_error: Option<String>,
    pub refreshes: Mutex<u32>,
    pub list_calls: Mutex<Vec<(String, String, DayWindow)>>,
    pub watches: Mutex<Vec<WatchRequest>>,
}

impl FakeProvider {
    pub fn refresh_calls(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }

    /// (access token, calendar id, window) per `list_events` call
    pub fn list_calls(&self) -> Vec<(String, String, DayWindow)> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn watch_requests(&self) -> Vec<WatchRequest> {
        self.watches.lock().unwrap().clone()
    }
}

impl CalendarProvider for FakeProvider {
    async fn refresh_access_token(&self, _credential: &Credential) -> Result<RefreshedToken> {
        *self.refreshes.lock().unwrap() += 1;
        if self.refresh_fails {
            return Err(classify_provider_error(
                400,
                r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
            ));
        }
        Ok(RefreshedToken {
            access_token: "refreshed-token".to_string(),
            expires_in: Some(3599),
        })
    }

    async fn list_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        window: &DayWindow,
    ) -> Result<Vec<CalendarEvent>> {
        self.list_calls.lock().unwrap().push((
            credential.access_token()?.to_string(),
            calendar_id.to_string(),
            *window,
        ));
        if let Some(message) = &self.list_error {
            return Err(Error::Provider {
                status: 500,
                message: message.clone(),
            });
        }
        Ok(self.events.clone())
    }

    async fn list_calendars(&self, _credential: &Credential) -> Result<Vec<CalendarSummary>> {
        Ok(self.calendars.clone())
    }

    async fn watch_events(
        &self,
        _credential: &Credential,
        _calendar_id: &str,
        request: &WatchRequest,
    ) -> Result<WatchResponse> {
        self.watches.lock().unwrap().push(request.clone());
        if let Some(message) = &self.watch_error {
            let body = serde_json::json!({ "error": { "code": 400, "message": message } });
            return Err(classify_provider_error(400, &body.to_string()));
        }
        Ok(WatchResponse {
            id: request.id.clone(),
            resource_id: "resource-1".to_string(),
            resource_uri: None,
            expiration: request
                .expiration
                .map(|dt| dt.timestamp_millis().to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakePush {
    pub fails: bool,
    pub sent: Mutex<Vec<NotificationMessage>>,
}

impl FakePush {
    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl PushSender for FakePush {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fails {
            return Err(Error::Provider {
                status: 400,
                message: "invalid user key".to_string(),
            });
        }
        Ok(())
    }
}
