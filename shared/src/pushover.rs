//! Pushover push-notification delivery.

use tracing::{error, info};

use crate::config::NotifierConfig;
use crate::schedule::NotificationMessage;
use crate::{Error, Result};

pub const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Something that can deliver a notification.
#[allow(async_fn_in_trait)]
pub trait PushSender {
    async fn send(&self, message: &NotificationMessage) -> Result<()>;
}

/// Pushover messages API client.
#[derive(Debug, Clone)]
pub struct PushoverClient {
    http_client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    user: Option<String>,
}

impl PushoverClient {
    pub fn new(http_client: reqwest::Client, token: Option<String>, user: Option<String>) -> Self {
        Self {
            http_client,
            endpoint: PUSHOVER_API_URL.to_string(),
            token,
            user,
        }
    }

    pub fn from_config(http_client: reqwest::Client, config: &NotifierConfig) -> Self {
        Self::new(
            http_client,
            config.pushover_token.clone(),
            config.pushover_user.clone(),
        )
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl PushSender for PushoverClient {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        let (Some(token), Some(user)) = (self.token.as_deref(), self.user.as_deref()) else {
            return Err(Error::Config(
                "Pushover credentials not found in environment variables".to_string(),
            ));
        };

        let params = [
            ("token", token),
            ("user", user),
            ("title", message.title.as_str()),
            ("message", message.body.as_str()),
            ("priority", "0"),
            ("sound", "default"),
        ];

        let response = self
            .http_client
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to send Pushover notification: {}", e)))?;

        let status = response.status().as_u16();
        if status == 200 {
            info!("Pushover notification sent successfully");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(status, body = %body, "Pushover rejected notification");
        Err(Error::Provider {
            status,
            message: body,
        })
    }
}
