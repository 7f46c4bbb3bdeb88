//! Lambda invocation payloads and the `{statusCode, body}` result shape.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use serde_json::Value;

use crate::notifier::RunSummary;
use crate::Result;

/// What started this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// EventBridge schedule, a manual test event, or anything unrecognised
    Scheduled,
    /// Channel handshake Google sends right after a channel is created
    ChannelSync { channel_id: Option<String> },
    /// Calendar change delivered through a channel
    CalendarChanged {
        channel_id: Option<String>,
        resource_state: String,
    },
    /// Reachability probe from the webhook setup tool
    ConnectivityProbe,
}

impl Invocation {
    /// Classify a raw invocation payload.
    pub fn classify(payload: &Value) -> Self {
        if let Some(headers) = payload.get("headers").and_then(Value::as_object) {
            let header = |name: &str| {
                headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .and_then(|(_, v)| v.as_str())
                    .map(String::from)
            };

            if let Some(resource_state) = header("x-goog-resource-state") {
                let channel_id = header("x-goog-channel-id");
                return if resource_state == "sync" {
                    Invocation::ChannelSync { channel_id }
                } else {
                    Invocation::CalendarChanged {
                        channel_id,
                        resource_state,
                    }
                };
            }

            if request_body(payload)
                .and_then(|body| serde_json::from_str::<Value>(&body).ok())
                .and_then(|body| body.get("test").and_then(Value::as_str).map(String::from))
                .is_some_and(|test| test == "webhook_connectivity")
            {
                return Invocation::ConnectivityProbe;
            }
        }

        Invocation::Scheduled
    }

    /// Whether this invocation should fetch and send the schedule.
    pub fn sends_schedule(&self) -> bool {
        matches!(
            self,
            Invocation::Scheduled | Invocation::CalendarChanged { .. }
        )
    }
}

/// Function URL request body, decoded when the runtime base64-encoded it.
fn request_body(payload: &Value) -> Option<String> {
    let body = payload.get("body").and_then(Value::as_str)?;
    let encoded = payload
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if encoded {
        STANDARD
            .decode(body)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    } else {
        Some(body.to_string())
    }
}

/// Result returned to the invocation trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn success<Tz: TimeZone>(summary: &RunSummary, now: &DateTime<Tz>) -> Result<Self>
    where
        Tz::Offset: std::fmt::Display,
    {
        let body = serde_json::json!({
            "message": "Schedule notifications sent successfully",
            "events_count": summary.events_count,
            "notification_sent": summary.notification_sent,
            "events": summary.events,
            "timestamp": now.to_rfc3339(),
        });

        Ok(Self {
            status_code: 200,
            body: serde_json::to_string(&body)?,
        })
    }

    /// 200 without running the notifier.
    pub fn acknowledged<Tz: TimeZone>(message: &str, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let body = serde_json::json!({
            "message": message,
            "timestamp": now.to_rfc3339(),
        });

        Self {
            status_code: 200,
            body: body.to_string(),
        }
    }

    pub fn failure<Tz: TimeZone>(error: &dyn std::fmt::Display, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let body = serde_json::json!({
            "error": error.to_string(),
            "timestamp": now.to_rfc3339(),
        });

        Self {
            status_code: 500,
            body: body.to_string(),
        }
    }
}
