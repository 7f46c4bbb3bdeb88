//! Google Calendar Webhook Setup
//!
//! Registers a push-notification channel so Google Calendar calls the notifier's
//! Lambda Function URL whenever the notifier's calendar changes (`GOOGLE_CALENDAR_ID`,
//! defaulting to the primary calendar).
//!
//! Channels expire after at most six days. Nothing renews them automatically:
//! re-run this tool before the expiry recorded in `webhook_info.json`.

use std::path::Path;

use anyhow::Context;
use chrono::{Local, Utc};
use inquire::validator::Validation;
use inquire::{CustomUserError, Text};
use shared::config::{calendar_id_from_env, CREDENTIALS_FILE, WEBHOOK_INFO_FILE};
use shared::webhook::{probe_endpoint, register_channel, validate_function_url};
use shared::{authorize, Credential, Error, GoogleCalendarClient, WebhookChannel};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_troubleshooting(error: &Error) {
    let guidance = error.troubleshooting();
    println!();
    println!("🔧 {}:", guidance.heading);
    for step in guidance.steps {
        println!("- {}", step);
    }
}

/// Mention the channel from a previous run, if any.
fn report_previous_channel(path: &Path) {
    if !path.exists() {
        return;
    }

    match WebhookChannel::load(path) {
        Ok(channel) if channel.is_expired(Utc::now()) => {
            println!(
                "ℹ️ Previous channel {} expired at {}",
                channel.channel_id,
                channel.expires.with_timezone(&Local)
            );
        }
        Ok(channel) => {
            let remaining = channel.remaining(Utc::now());
            println!(
                "ℹ️ Previous channel {} is still active for {}h {}m; a new channel will be added alongside it",
                channel.channel_id,
                remaining.num_hours(),
                remaining.num_minutes() % 60
            );
        }
        Err(e) => warn!(error = %e, file = %path.display(), "Could not read previous webhook info"),
    }
    println!();
}

fn prompt_function_url() -> anyhow::Result<String> {
    println!("📋 LAMBDA FUNCTION URL REQUIRED");
    println!("{}", "-".repeat(40));
    println!("You need your Lambda Function URL from AWS Console:");
    println!("1. Go to your Lambda function");
    println!("2. Configuration → Function URL");
    println!("3. Copy the Function URL");
    println!();

    let url = Text::new("Enter your Lambda Function URL:")
        .with_validator(
            |input: &str| -> Result<Validation, CustomUserError> {
                match validate_function_url(input) {
                    Ok(_) => Ok(Validation::Valid),
                    Err(e) => Ok(Validation::Invalid(format!("❌ {}", e).into())),
                }
            },
        )
        .prompt()
        .context("No Lambda Function URL provided")?;

    Ok(url.trim().to_string())
}

/// Load and refresh the credential written by `generate_credentials`.
async fn load_credential(calendar: &GoogleCalendarClient) -> anyhow::Result<Option<Credential>> {
    let path = Path::new(CREDENTIALS_FILE);
    if !path.exists() {
        println!("❌ {} not found!", CREDENTIALS_FILE);
        println!();
        println!("📋 REQUIRED:");
        println!("1. Run generate_credentials first");
        println!("2. This will create {}", CREDENTIALS_FILE);
        println!("3. Then run this tool again");
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", CREDENTIALS_FILE))?;

    let credential = match Credential::from_env_file(&contents) {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Error loading credentials: {}", e);
            return Ok(None);
        }
    };

    match authorize(calendar, credential, Utc::now()).await {
        Ok(c) => Ok(Some(c)),
        Err(e) => {
            println!("❌ Invalid credentials - please regenerate ({})", e);
            Ok(None)
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    println!("🔗 GOOGLE CALENDAR WEBHOOK SETUP");
    println!("{}", "=".repeat(40));
    println!("This tool connects Google Calendar to your AWS Lambda function");
    println!("for real-time notifications when your calendar changes.");
    println!();

    report_previous_channel(Path::new(WEBHOOK_INFO_FILE));

    let webhook_url = prompt_function_url()?;
    println!("✅ Using webhook URL: {}", webhook_url);

    let http_client = reqwest::Client::new();

    println!("🧪 Testing webhook endpoint accessibility...");
    match probe_endpoint(&http_client, &webhook_url, Utc::now()).await {
        Ok(outcome) if outcome.is_ok() => println!("✅ Webhook endpoint is accessible!"),
        Ok(outcome) => {
            println!("⚠️ Webhook endpoint returned status: {}", outcome.status);
            println!("This might still work - Google's webhook verification is different");
        }
        Err(e) => {
            println!("❌ {}", e);
            print_troubleshooting(&e);
            println!();
            println!("❌ Webhook endpoint test failed. Please fix the issues above.");
            return Ok(false);
        }
    }
    println!();

    println!("🔐 Loading Google Calendar credentials...");
    let calendar = GoogleCalendarClient::new(http_client);
    let Some(credential) = load_credential(&calendar).await? else {
        return Ok(false);
    };
    println!("✅ Google Calendar credentials loaded successfully");
    println!();

    let now = Utc::now();
    let calendar_id = calendar_id_from_env();
    println!("🔗 Creating webhook channel for calendar {}...", calendar_id);
    let channel = match register_channel(
        &calendar,
        &credential,
        &calendar_id,
        &webhook_url,
        now,
    )
    .await
    {
        Ok((_, channel)) => channel,
        Err(e) => {
            println!("❌ Error creating webhook: {}", e);
            print_troubleshooting(&e);
            return Ok(false);
        }
    };

    channel
        .save(Path::new(WEBHOOK_INFO_FILE))
        .with_context(|| format!("Failed to write {}", WEBHOOK_INFO_FILE))?;
    info!(file = WEBHOOK_INFO_FILE, channel_id = %channel.channel_id, "Saved webhook info");

    println!();
    println!("🎉 WEBHOOK SETUP SUCCESSFUL!");
    println!("{}", "=".repeat(40));
    println!("✅ Channel ID: {}", channel.channel_id);
    println!("✅ Resource ID: {}", channel.resource_id);
    println!("✅ Expires: {}", channel.expires.with_timezone(&Local));
    println!();
    println!("💾 Webhook info saved to: {}", WEBHOOK_INFO_FILE);
    println!();
    println!("🧪 TESTING INSTRUCTIONS:");
    println!("{}", "-".repeat(30));
    println!("1. Create/edit/delete an event in your calendar");
    println!("2. Wait 30 seconds for sync");
    println!("3. Check your Lambda CloudWatch logs");
    println!("4. Look for: 'Calendar webhook received'");
    println!("5. You should get your daily schedule notification");
    println!();
    println!("⚠️ IMPORTANT NOTES:");
    println!("- Webhook expires in 6 days");
    println!("- Renewal is manual: re-run this tool before it expires");

    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if run().await? {
        println!();
        println!("✅ Webhook setup successful! Your calendar is now connected to Lambda.");
        Ok(())
    } else {
        println!();
        println!("❌ Webhook setup failed. Please resolve the issues above.");
        std::process::exit(1);
    }
}
