//! Google Calendar push-notification channels.
//!
//! Channels are created by the `setup_webhook` tool and recorded in `webhook_info.json`.
//! Google caps a channel's lifetime, so they have to be recreated by re-running the tool.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};
use url::Url;

use crate::credentials::Credential;
use crate::provider::CalendarProvider;
use crate::{Error, Result};

/// Longest channel lifetime Google accepts for calendar events.
pub const MAX_CHANNEL_LIFETIME_DAYS: i64 = 6;

pub const CHANNEL_TYPE: &str = "web_hook";

const PROBE_TIMEOUT_SECS: u64 = 10;

/// Body of an `events.watch` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub address: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_epoch_millis"
    )]
    pub expiration: Option<DateTime<Utc>>,
}

fn serialize_epoch_millis<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(dt) => serializer.serialize_str(&dt.timestamp_millis().to_string()),
        None => serializer.serialize_none(),
    }
}

impl WatchRequest {
    /// Channel without an explicit expiration; Google applies its default lifetime.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_type: CHANNEL_TYPE.to_string(),
            address: address.into(),
            expiration: None,
        }
    }

    /// Set the expiration, clamped to [`MAX_CHANNEL_LIFETIME_DAYS`] after `now`.
    pub fn expiring_at(mut self, requested: DateTime<Utc>, now: DateTime<Utc>) -> Result<Self> {
        self.expiration = Some(clamp_expiration(requested, now)?);
        Ok(self)
    }
}

/// Clamp a requested expiration to the provider's maximum channel lifetime.
///
/// Expirations at or before `now` are rejected.
pub fn clamp_expiration(requested: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if requested <= now {
        return Err(Error::Validation(format!(
            "channel expiration {} is not in the future",
            requested.to_rfc3339()
        )));
    }

    let ceiling = now + Duration::days(MAX_CHANNEL_LIFETIME_DAYS);
    if requested > ceiling {
        warn!(
            requested = %requested.to_rfc3339(),
            ceiling = %ceiling.to_rfc3339(),
            "Requested channel expiration exceeds provider maximum, clamping"
        );
        return Ok(ceiling);
    }

    Ok(requested)
}

/// Channel id unique per registration second.
pub fn channel_id(now: DateTime<Utc>) -> String {
    format!("lambda-webhook-{}", now.timestamp())
}

/// Response of an `events.watch` call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub id: String,
    pub resource_id: String,
    pub resource_uri: Option<String>,
    /// Epoch milliseconds, encoded as a string by Google
    pub expiration: Option<String>,
}

impl WatchResponse {
    pub fn expiration_time(&self) -> Option<DateTime<Utc>> {
        self.expiration
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// Record of an active subscription, persisted as `webhook_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookChannel {
    pub channel_id: String,
    pub resource_id: String,
    pub webhook_url: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl WebhookChannel {
    /// Build the record from the provider's response.
    ///
    /// The provider-reported expiration wins over the requested one.
    pub fn from_response(
        response: &WatchResponse,
        request: &WatchRequest,
        created: DateTime<Utc>,
    ) -> Self {
        let expires = response
            .expiration_time()
            .or(request.expiration)
            .unwrap_or_else(|| created + Duration::days(MAX_CHANNEL_LIFETIME_DAYS));

        Self {
            channel_id: response.id.clone(),
            resource_id: response.resource_id.clone(),
            webhook_url: request.address.clone(),
            created,
            expires: expires.max(created),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires - now).max(Duration::zero())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Check that `input` looks like a Lambda Function URL.
pub fn validate_function_url(input: &str) -> Result<Url> {
    let input = input.trim();

    if input.is_empty() {
        return Err(Error::Validation("URL cannot be empty".to_string()));
    }

    if !input.starts_with("https://") {
        return Err(Error::Validation("URL must start with https://".to_string()));
    }

    let url = Url::parse(input)
        .map_err(|e| Error::Validation(format!("URL could not be parsed: {}", e)))?;

    let looks_like_function_url = url
        .host_str()
        .is_some_and(|host| host.contains(".lambda-url."));
    if !looks_like_function_url {
        return Err(Error::Validation(
            "This doesn't look like a Lambda Function URL".to_string(),
        ));
    }

    Ok(url)
}

/// Result of the reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: u16,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// POST a small test payload to the endpoint.
///
/// Any HTTP response counts as reachable; only transport failures are errors.
pub async fn probe_endpoint(
    http: &reqwest::Client,
    url: &str,
    now: DateTime<Utc>,
) -> Result<ProbeOutcome> {
    let payload = serde_json::json!({
        "test": "webhook_connectivity",
        "timestamp": now.to_rfc3339(),
    });

    let response = http
        .post(url)
        .json(&payload)
        .timeout(StdDuration::from_secs(PROBE_TIMEOUT_SECS))
        .send()
        .await
        .map_err(|e| Error::Transport(format!("Cannot reach webhook endpoint: {}", e)))?;

    let outcome = ProbeOutcome {
        status: response.status().as_u16(),
    };

    if outcome.is_ok() {
        info!(url, "Webhook endpoint is reachable");
    } else {
        warn!(url, status = outcome.status, "Webhook endpoint returned non-200 status");
    }

    Ok(outcome)
}

/// Register a channel that expires [`MAX_CHANNEL_LIFETIME_DAYS`] from `now`.
pub async fn register_channel<P: CalendarProvider>(
    provider: &P,
    credential: &Credential,
    calendar_id: &str,
    webhook_url: &str,
    now: DateTime<Utc>,
) -> Result<(WatchRequest, WebhookChannel)> {
    let request = WatchRequest::new(channel_id(now), webhook_url)
        .expiring_at(now + Duration::days(MAX_CHANNEL_LIFETIME_DAYS), now)?;

    info!(
        channel_id = %request.id,
        webhook_url,
        "Creating webhook channel"
    );

    let response = provider
        .watch_events(credential, calendar_id, &request)
        .await?;

    let channel = WebhookChannel::from_response(&response, &request, now);

    info!(
        channel_id = %channel.channel_id,
        resource_id = %channel.resource_id,
        expires = %channel.expires.to_rfc3339(),
        "Webhook channel created"
    );

    Ok((request, channel))
}
