//! Day window computation and schedule message formatting.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const EMPTY_SCHEDULE_MESSAGE: &str = "No events scheduled for today! 🎉";
pub const ALL_DAY: &str = "All day";
pub const NO_TITLE: &str = "No title";

/// Start of a calendar event as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum EventStart {
    /// Timed event, kept in the offset the provider reported
    DateTime(DateTime<FixedOffset>),
    /// All-day event
    Date(NaiveDate),
}

/// Read-only snapshot of a provider event.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub start: EventStart,
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// An event as it appears in the daily summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// `HH:MM` or "All day"
    pub time: String,
    pub title: String,
    pub location: String,
    pub description: String,
}

impl From<&CalendarEvent> for ScheduleEntry {
    fn from(event: &CalendarEvent) -> Self {
        let time = match &event.start {
            EventStart::DateTime(dt) => dt.format("%H:%M").to_string(),
            EventStart::Date(_) => ALL_DAY.to_string(),
        };

        Self {
            time,
            title: event
                .title
                .clone()
                .unwrap_or_else(|| NO_TITLE.to_string()),
            location: event.location.clone().unwrap_or_default(),
            description: event.description.clone().unwrap_or_default(),
        }
    }
}

/// Notification title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
}

/// Half-open `[start, end)` query window covering one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// The day containing `now`, bounded by midnight in `now`'s time zone.
    ///
    /// Falls back to `now` itself when local midnight doesn't exist (DST gap at 00:00).
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc));

        Self {
            start,
            end: start + Duration::hours(24),
        }
    }

    /// Lower bound in the provider's RFC 3339 encoding.
    pub fn time_min(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Upper bound in the provider's RFC 3339 encoding.
    pub fn time_max(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Format the day's events into the notification body.
pub fn format_schedule(entries: &[ScheduleEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_SCHEDULE_MESSAGE.to_string();
    }

    let mut message = format!("Today's Schedule ({} events):\n\n", entries.len());
    for entry in entries {
        message.push_str(&format!("• {} - {}", entry.time, entry.title));
        if !entry.location.is_empty() {
            message.push_str(&format!(" ({})", entry.location));
        }
        message.push('\n');
    }
    message
}

/// "Daily Schedule - Friday, March 15"
pub fn schedule_title<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Daily Schedule - {}", now.format("%A, %B %d"))
}

/// Build the full notification for a day.
pub fn build_message<Tz: TimeZone>(
    now: &DateTime<Tz>,
    entries: &[ScheduleEntry],
) -> NotificationMessage
where
    Tz::Offset: std::fmt::Display,
{
    NotificationMessage {
        title: schedule_title(now),
        body: format_schedule(entries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: &str, title: &str, location: &str) -> ScheduleEntry {
        ScheduleEntry {
            time: time.to_string(),
            title: title.to_string(),
            location: location.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_empty_schedule() {
        assert_eq!(format_schedule(&[]), "No events scheduled for today! 🎉");
    }

    #[test]
    fn test_schedule_body() {
        let entries = vec![entry("09:00", "Standup", ""), entry("14:30", "Review", "Room A")];
        assert_eq!(
            format_schedule(&entries),
            "Today's Schedule (2 events):\n\n• 09:00 - Standup\n• 14:30 - Review (Room A)\n"
        );
    }

    #[test]
    fn test_all_day_event() {
        let event = CalendarEvent {
            start: EventStart::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
            title: Some("Holiday".to_string()),
            location: None,
            description: None,
        };
        let entry = ScheduleEntry::from(&event);
        assert_eq!(entry.time, "All day");
        assert_eq!(entry.location, "");
    }

    #[test]
    fn test_timed_event_keeps_its_offset() {
        let start = DateTime::parse_from_rfc3339("2024-03-15T09:05:00-04:00").unwrap();
        let event = CalendarEvent {
            start: EventStart::DateTime(start),
            title: None,
            location: Some("Room B".to_string()),
            description: Some("notes".to_string()),
        };
        let entry = ScheduleEntry::from(&event);
        assert_eq!(entry.time, "09:05");
        assert_eq!(entry.title, "No title");
        assert_eq!(entry.location, "Room B");
        assert_eq!(entry.description, "notes");
    }

    #[test]
    fn test_day_window_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 42, 9).unwrap();
        let window = DayWindow::containing(&now);
        assert_eq!(window.time_min(), "2024-03-15T00:00:00Z");
        assert_eq!(window.time_max(), "2024-03-16T00:00:00Z");
    }

    #[test]
    fn test_day_window_fixed_offset() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 3, 15, 23, 30, 0).unwrap();
        let window = DayWindow::containing(&now);
        assert_eq!(window.time_min(), "2024-03-15T05:00:00Z");
        assert_eq!(window.time_max(), "2024-03-16T05:00:00Z");
    }

    #[test]
    fn test_title() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();
        assert_eq!(schedule_title(&now), "Daily Schedule - Friday, March 15");

        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        let message = build_message(&now, &[]);
        assert_eq!(message.title, "Daily Schedule - Tuesday, March 05");
        assert_eq!(message.body, EMPTY_SCHEDULE_MESSAGE);
    }
}
