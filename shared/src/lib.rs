//! Shared library for the daily schedule relay.
//!
//! This crate holds everything the notifier Lambda and the two setup tools have in
//! common: the credential encoding, the Google Calendar and Pushover clients, schedule
//! formatting and the webhook channel record.

pub mod config;
pub mod credentials;
pub mod error;
pub mod google;
pub mod notifier;
pub mod oauth;
pub mod provider;
pub mod pushover;
pub mod schedule;
pub mod trigger;
pub mod webhook;

#[cfg(test)]
mod test_support;

pub use config::NotifierConfig;
pub use credentials::Credential;
pub use error::{Error, Result, Troubleshooting};
pub use google::GoogleCalendarClient;
pub use notifier::{RunSummary, ScheduleNotifier};
pub use provider::{authorize, CalendarProvider, CalendarSummary};
pub use pushover::{PushSender, PushoverClient};
pub use schedule::{CalendarEvent, DayWindow, NotificationMessage, ScheduleEntry};
pub use trigger::{Invocation, InvocationResponse};
pub use webhook::{WatchRequest, WatchResponse, WebhookChannel};
