//! Google Calendar v3 REST adapter.
//!
//! This is the only place that knows Google's wire formats, including the error
//! messages that distinguish webhook rejections from other failures.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::credentials::Credential;
use crate::provider::{CalendarProvider, CalendarSummary, RefreshedToken};
use crate::schedule::{CalendarEvent, DayWindow, EventStart};
use crate::webhook::{WatchRequest, WatchResponse};
use crate::{Error, Result};

pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

const PAGE_SIZE: &str = "250";

/// Google Calendar event from API
#[derive(Debug, Deserialize)]
struct GoogleCalendarEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<GoogleEventTime>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventList {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarList {
    items: Option<Vec<CalendarSummary>>,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

impl TryFrom<GoogleCalendarEvent> for CalendarEvent {
    type Error = Error;

    fn try_from(event: GoogleCalendarEvent) -> Result<Self> {
        let start = event
            .start
            .ok_or_else(|| Error::Validation("Event has no start time".to_string()))?;

        let start = if let Some(date_time) = &start.date_time {
            let dt = DateTime::parse_from_rfc3339(date_time)
                .map_err(|e| Error::Validation(format!("Invalid datetime: {}", e)))?;
            EventStart::DateTime(dt)
        } else if let Some(date) = &start.date {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| Error::Validation(format!("Invalid date: {}", e)))?;
            EventStart::Date(day)
        } else {
            return Err(Error::Validation("Event has no start time".to_string()));
        };

        Ok(CalendarEvent {
            start,
            title: event.summary,
            location: event.location,
            description: event.description,
        })
    }
}

/// Turn a non-success response body into a tagged error.
///
/// Understands both the Calendar API envelope (`{"error": {"message": ..}}`) and the
/// OAuth token endpoint shape (`{"error": "invalid_grant", "error_description": ..}`).
pub fn classify_provider_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            match error {
                serde_json::Value::Object(_) => {
                    error.get("message").and_then(|m| m.as_str()).map(String::from)
                }
                serde_json::Value::String(code) => Some(
                    value
                        .get("error_description")
                        .and_then(|d| d.as_str())
                        .map(|d| format!("{}: {}", code, d))
                        .unwrap_or_else(|| code.clone()),
                ),
                _ => None,
            }
        })
        .unwrap_or_else(|| body.trim().to_string());

    let lowered = message.to_lowercase();
    if lowered.contains("webhook verification failed") {
        Error::WebhookVerificationFailed(message)
    } else if lowered.contains("invalid webhook url") {
        Error::InvalidWebhookUrl(message)
    } else {
        Error::Provider { status, message }
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_provider_error(status.as_u16(), &body))
}

/// Client for the Google Calendar REST API.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    api_base: String,
}

impl GoogleCalendarClient {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_api_base(http_client, CALENDAR_API_BASE)
    }

    /// Point the client at another API root.
    pub fn with_api_base(http_client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        )
    }
}

impl CalendarProvider for GoogleCalendarClient {
    async fn refresh_access_token(&self, credential: &Credential) -> Result<RefreshedToken> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::CredentialInvalid("no refresh token".to_string()))?;

        let params = [
            ("refresh_token", refresh_token),
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&credential.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Token refresh request failed: {}", e)))?;

        let token_response: GoogleTokenResponse = check_response(response).await?.json().await?;

        Ok(RefreshedToken {
            access_token: token_response.access_token,
            expires_in: token_response.expires_in,
        })
    }

    async fn list_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        window: &DayWindow,
    ) -> Result<Vec<CalendarEvent>> {
        let access_token = credential.access_token()?;
        let time_min = window.time_min();
        let time_max = window.time_max();

        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", PAGE_SIZE),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.as_str()));
            }

            let response = self
                .http_client
                .get(self.events_url(calendar_id))
                .bearer_auth(access_token)
                .query(&query)
                .send()
                .await
                .map_err(|e| Error::Transport(format!("Calendar API request failed: {}", e)))?;

            let page: GoogleEventList = check_response(response).await?.json().await?;

            for item in page.items.unwrap_or_default() {
                if item.status.as_deref() == Some("cancelled") {
                    continue;
                }
                let id = item.id.clone().unwrap_or_default();
                match CalendarEvent::try_from(item) {
                    Ok(event) => all_events.push(event),
                    Err(e) => warn!(event_id = %id, error = %e, "Skipping unreadable event"),
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        debug!(count = all_events.len(), calendar_id, "Fetched calendar events");
        Ok(all_events)
    }

    async fn list_calendars(&self, credential: &Credential) -> Result<Vec<CalendarSummary>> {
        let response = self
            .http_client
            .get(format!("{}/users/me/calendarList", self.api_base))
            .bearer_auth(credential.access_token()?)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Calendar list request failed: {}", e)))?;

        let list: GoogleCalendarList = check_response(response).await?.json().await?;
        Ok(list.items.unwrap_or_default())
    }

    async fn watch_events(
        &self,
        credential: &Credential,
        calendar_id: &str,
        request: &WatchRequest,
    ) -> Result<WatchResponse> {
        let response = self
            .http_client
            .post(format!("{}/watch", self.events_url(calendar_id)))
            .bearer_auth(credential.access_token()?)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Watch request failed: {}", e)))?;

        Ok(check_response(response).await?.json().await?)
    }
}
