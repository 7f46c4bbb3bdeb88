//! Error types for the daily schedule relay.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Google Calendar, Pushover or the local setup files.
#[derive(Error, Debug)]
pub enum Error {
    /// No credential blob was supplied
    #[error("No Google Calendar credentials found")]
    CredentialMissing,

    /// Credential could not be decoded, lacks scopes, or cannot be refreshed
    #[error("Invalid credentials: {0}")]
    CredentialInvalid(String),

    /// Network or timeout failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// API-level rejection carrying the provider's message
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Google could not verify the webhook address
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Google rejected the webhook address outright
    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    /// Missing environment variable or file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

/// Remediation shown to the operator of a setup tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Troubleshooting {
    pub heading: &'static str,
    pub steps: &'static [&'static str],
}

impl Error {
    /// Remediation text keyed on the error category.
    pub fn troubleshooting(&self) -> Troubleshooting {
        match self {
            Error::WebhookVerificationFailed(_) => Troubleshooting {
                heading: "WEBHOOK VERIFICATION FAILED",
                steps: &[
                    "Make sure your Lambda Function URL is publicly accessible",
                    "Verify Auth type is set to NONE",
                    "Check that CORS is properly configured",
                    "Ensure your Lambda function is deployed and working",
                ],
            },
            Error::InvalidWebhookUrl(_) => Troubleshooting {
                heading: "INVALID WEBHOOK URL",
                steps: &[
                    "URL must be HTTPS",
                    "URL must be publicly accessible",
                    "Check your Lambda Function URL is correct",
                ],
            },
            Error::CredentialMissing | Error::CredentialInvalid(_) => Troubleshooting {
                heading: "CREDENTIALS",
                steps: &[
                    "Run generate_credentials first",
                    "This will create lambda_credentials.txt",
                    "Regenerate the file if the refresh token was revoked",
                ],
            },
            Error::Transport(_) => Troubleshooting {
                heading: "CONNECTIVITY",
                steps: &[
                    "Verify the Lambda Function URL is correct",
                    "Check that Auth type is set to NONE",
                    "Ensure CORS is enabled",
                ],
            },
            _ => Troubleshooting {
                heading: "TROUBLESHOOTING",
                steps: &[
                    "Verify Google Calendar API is enabled",
                    "Check OAuth credentials are valid",
                    "Ensure webhook URL is accessible",
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_failures_have_distinct_guidance() {
        let verification = Error::WebhookVerificationFailed("x".into()).troubleshooting();
        let invalid = Error::InvalidWebhookUrl("x".into()).troubleshooting();
        let generic = Error::Provider {
            status: 403,
            message: "Forbidden".into(),
        }
        .troubleshooting();

        assert_eq!(verification.heading, "WEBHOOK VERIFICATION FAILED");
        assert_eq!(invalid.heading, "INVALID WEBHOOK URL");
        assert_eq!(generic.heading, "TROUBLESHOOTING");
    }
}
