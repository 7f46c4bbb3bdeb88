//! Daily Schedule Lambda - Sends today's Google Calendar events to Pushover.
//!
//! Invoked by an EventBridge schedule or by Google Calendar push notifications
//! arriving on the function URL:
//! 1. Loads the Google credential blob and refreshes it if needed
//! 2. Fetches today's events (local day, recurring events expanded)
//! 3. Formats the schedule and posts it to Pushover
//! 4. Returns `{statusCode, body}` with the run summary

use chrono::Local;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use shared::{
    GoogleCalendarClient, Invocation, InvocationResponse, NotifierConfig, PushoverClient,
    ScheduleNotifier,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    notifier: ScheduleNotifier<GoogleCalendarClient, PushoverClient>,
}

impl AppState {
    fn new() -> shared::Result<Self> {
        let config = NotifierConfig::from_env();

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| shared::Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let calendar = GoogleCalendarClient::new(http_client.clone());
        let pushover = PushoverClient::from_config(http_client, &config);

        Ok(Self {
            notifier: ScheduleNotifier::new(calendar, pushover, &config),
        })
    }
}

async fn respond(state: &AppState, payload: &Value) -> shared::Result<InvocationResponse> {
    let now = Local::now();
    let invocation = Invocation::classify(payload);

    match &invocation {
        Invocation::ChannelSync { channel_id } => {
            info!(channel_id = ?channel_id, "Calendar webhook channel handshake received")
        }
        Invocation::ConnectivityProbe => info!("Webhook connectivity probe received"),
        Invocation::CalendarChanged {
            channel_id,
            resource_state,
        } => {
            info!(
                channel_id = ?channel_id,
                resource_state = %resource_state,
                "Calendar webhook received"
            )
        }
        Invocation::Scheduled => {}
    }

    if !invocation.sends_schedule() {
        return Ok(InvocationResponse::acknowledged("Webhook acknowledged", &now));
    }

    let summary = state.notifier.run(now).await;

    info!(
        events = summary.events_count,
        notification_sent = summary.notification_sent,
        "Daily schedule run complete"
    );

    InvocationResponse::success(&summary, &now)
}

/// Answer one invocation; init and run failures both become a 500 body.
async fn handle(state: &shared::Result<AppState>, payload: &Value) -> InvocationResponse {
    let result = match state {
        Ok(state) => respond(state, payload).await,
        Err(e) => {
            error!(error = %e, "Notifier was not initialised");
            return InvocationResponse::failure(e, &Local::now());
        }
    };

    match result {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Error in handler");
            InvocationResponse::failure(&e, &Local::now())
        }
    }
}

async fn handler(
    state: Arc<shared::Result<AppState>>,
    event: LambdaEvent<Value>,
) -> Result<InvocationResponse, Error> {
    Ok(handle(&state, &event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new());

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
