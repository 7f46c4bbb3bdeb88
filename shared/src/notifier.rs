//! Daily schedule notifier: today's events in, one push notification out.
//!
//! Every step degrades instead of failing. Missing or broken credentials mean no
//! events, and a failed push only flips `notification_sent`.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::NotifierConfig;
use crate::credentials::Credential;
use crate::provider::{authorize, CalendarProvider};
use crate::pushover::PushSender;
use crate::schedule::{build_message, DayWindow, ScheduleEntry};
use crate::{Error, Result};

/// Outcome of one notifier run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events_count: usize,
    pub notification_sent: bool,
    pub events: Vec<ScheduleEntry>,
}

pub struct ScheduleNotifier<P, S> {
    provider: P,
    push: S,
    credentials_blob: Option<String>,
    calendar_id: String,
}

impl<P: CalendarProvider, S: PushSender> ScheduleNotifier<P, S> {
    pub fn new(provider: P, push: S, config: &NotifierConfig) -> Self {
        Self {
            provider,
            push,
            credentials_blob: config.credentials_blob.clone(),
            calendar_id: config.calendar_id.clone(),
        }
    }

    /// Decode the configured blob and make it usable.
    async fn load_credential(&self, now: DateTime<Utc>) -> Result<Credential> {
        let blob = self
            .credentials_blob
            .as_deref()
            .ok_or(Error::CredentialMissing)?;

        let credential = Credential::decode(blob)?;
        authorize(&self.provider, credential, now).await
    }

    /// Today's events, or an empty list when anything goes wrong.
    pub async fn todays_events<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<ScheduleEntry> {
        let now_utc = now.with_timezone(&Utc);

        let credential = match self.load_credential(now_utc).await {
            Ok(c) => c,
            Err(Error::CredentialMissing) => {
                warn!("No Google Calendar credentials found in environment");
                return Vec::new();
            }
            Err(e) => {
                error!(error = %e, "Error processing credentials");
                return Vec::new();
            }
        };

        let window = DayWindow::containing(now);
        info!(
            calendar_id = %self.calendar_id,
            time_min = %window.time_min(),
            time_max = %window.time_max(),
            "Fetching today's calendar events"
        );

        match self
            .provider
            .list_events(&credential, &self.calendar_id, &window)
            .await
        {
            Ok(events) => events.iter().map(ScheduleEntry::from).collect(),
            Err(e) => {
                error!(error = %e, "Error getting calendar events");
                Vec::new()
            }
        }
    }

    /// Fetch, format and send today's schedule.
    pub async fn run<Tz: TimeZone>(&self, now: DateTime<Tz>) -> RunSummary
    where
        Tz::Offset: std::fmt::Display,
    {
        let events = self.todays_events(&now).await;
        let message = build_message(&now, &events);

        info!(title = %message.title, body = %message.body, "Formatted schedule");

        let notification_sent = match self.push.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Error sending Pushover notification");
                false
            }
        };

        RunSummary {
            events_count: events.len(),
            notification_sent,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{CalendarEvent, EventStart};
    use crate::test_support::{credential, FakeProvider, FakePush};
    use chrono::{Duration, FixedOffset};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 7, 0, 0).unwrap()
    }

    fn config(blob: Option<String>) -> NotifierConfig {
        NotifierConfig {
            credentials_blob: blob,
            pushover_token: Some("t".to_string()),
            pushover_user: Some("u".to_string()),
            calendar_id: "primary".to_string(),
        }
    }

    fn timed(hour: u32, minute: u32, title: &str, location: Option<&str>) -> CalendarEvent {
        let offset = FixedOffset::east_opt(0).unwrap();
        CalendarEvent {
            start: EventStart::DateTime(
                offset.with_ymd_and_hms(2024, 3, 15, hour, minute, 0).unwrap(),
            ),
            title: Some(title.to_string()),
            location: location.map(String::from),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_run_formats_and_sends() {
        let provider = FakeProvider {
            events: vec![
                timed(9, 0, "Standup", None),
                timed(14, 30, "Review", Some("Room A")),
            ],
            ..FakeProvider::default()
        };
        let notifier = ScheduleNotifier::new(
            provider,
            FakePush::default(),
            &config(Some(credential().encode().unwrap())),
        );

        let summary = notifier.run(now()).await;

        assert_eq!(summary.events_count, 2);
        assert!(summary.notification_sent);

        let sent = notifier.push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Daily Schedule - Friday, March 15");
        assert_eq!(
            sent[0].body,
            "Today's Schedule (2 events):\n\n• 09:00 - Standup\n• 14:30 - Review (Room A)\n"
        );

        let calls = notifier.provider.list_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "primary");
        assert_eq!(calls[0].2.time_min(), "2024-03-15T00:00:00Z");
        assert_eq!(calls[0].2.time_max(), "2024-03-16T00:00:00Z");
    }

    #[tokio::test]
    async fn test_undecodable_blob_yields_no_events() {
        let notifier = ScheduleNotifier::new(
            FakeProvider::default(),
            FakePush {
                fails: true,
                ..FakePush::default()
            },
            &config(Some("this is not base64!".to_string())),
        );

        let summary = notifier.run(now()).await;

        assert_eq!(summary.events_count, 0);
        assert!(summary.events.is_empty());
        assert!(!summary.notification_sent);
        assert!(notifier.provider.list_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_blob_still_sends_empty_schedule() {
        let notifier =
            ScheduleNotifier::new(FakeProvider::default(), FakePush::default(), &config(None));

        let summary = notifier.run(now()).await;

        assert_eq!(summary.events_count, 0);
        assert!(summary.notification_sent);
        assert_eq!(notifier.push.sent()[0].body, "No events scheduled for today! 🎉");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_listing() {
        let mut creds = credential();
        creds.expiry = Some(now() - Duration::minutes(10));
        let notifier = ScheduleNotifier::new(
            FakeProvider::default(),
            FakePush::default(),
            &config(Some(creds.encode().unwrap())),
        );

        notifier.run(now()).await;

        assert_eq!(notifier.provider.refresh_calls(), 1);
        assert_eq!(notifier.provider.list_calls()[0].0, "refreshed-token");
    }

    #[tokio::test]
    async fn test_unrefreshable_credential_degrades() {
        let mut creds = credential();
        creds.expiry = Some(now() - Duration::minutes(10));
        let notifier = ScheduleNotifier::new(
            FakeProvider {
                refresh_fails: true,
                events: vec![timed(9, 0, "Standup", None)],
                ..FakeProvider::default()
            },
            FakePush::default(),
            &config(Some(creds.encode().unwrap())),
        );

        let summary = notifier.run(now()).await;

        assert_eq!(summary.events_count, 0);
        assert!(summary.notification_sent);
        assert!(notifier.provider.list_calls().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let notifier = ScheduleNotifier::new(
            FakeProvider {
                list_error: Some("Backend Error".to_string()),
                ..FakeProvider::default()
            },
            FakePush::default(),
            &config(Some(credential().encode().unwrap())),
        );

        let summary = notifier.run(now()).await;
        assert_eq!(summary.events_count, 0);
        assert!(summary.notification_sent);
    }

    #[tokio::test]
    async fn test_push_failure_is_reported_not_raised() {
        let notifier = ScheduleNotifier::new(
            FakeProvider {
                events: vec![timed(9, 0, "Standup", None)],
                ..FakeProvider::default()
            },
            FakePush {
                fails: true,
                ..FakePush::default()
            },
            &config(Some(credential().encode().unwrap())),
        );

        let summary = notifier.run(now()).await;
        assert_eq!(summary.events_count, 1);
        assert!(!summary.notification_sent);
        assert_eq!(summary.events[0].time, "09:00");
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = RunSummary {
            events_count: 0,
            notification_sent: false,
            events: vec![],
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"events_count": 0, "notification_sent": false, "events": []})
        );
    }
}
