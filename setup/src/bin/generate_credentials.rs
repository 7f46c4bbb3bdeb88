//! Google Calendar OAuth Credentials Generator
//!
//! One-shot tool that runs the installed-app OAuth flow, smoke-tests the resulting
//! token and writes the base64 credential blob the notifier Lambda expects.
//!
//! Prerequisites:
//! 1. Google Calendar API enabled in Google Cloud Console
//! 2. OAuth 2.0 Desktop application credentials downloaded to the working directory
//!    as `credentials.json` or `client_secret_*.json`

use anyhow::Context;
use chrono::Utc;
use shared::config::CREDENTIALS_FILE;
use shared::oauth::{find_client_secret_file, CallbackListener, ClientSecrets};
use shared::webhook::WatchRequest;
use shared::{CalendarProvider, Credential, Error, GoogleCalendarClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PROBE_CHANNEL_ID: &str = "test-webhook-capability";
const PROBE_ADDRESS: &str = "https://example.com/webhook";

fn print_setup_instructions() {
    println!("📋 SETUP REQUIRED:");
    println!("1. Go to https://console.cloud.google.com/");
    println!("2. Create/select project");
    println!("3. Enable Google Calendar API");
    println!("4. Create OAuth consent screen (External)");
    println!("5. Add your email as test user");
    println!("6. Create OAuth client ID (Desktop application)");
    println!("7. Download JSON file to this directory");
    println!("8. Run this tool again");
}

/// Drive the browser consent flow and return a fresh credential.
async fn authenticate(
    http_client: &reqwest::Client,
    secrets: &ClientSecrets,
) -> shared::Result<Credential> {
    let listener = CallbackListener::bind().await?;
    let redirect_uri = listener.redirect_uri();
    let state = uuid::Uuid::new_v4().to_string();

    let auth_url = secrets.authorization_url(&redirect_uri, &state);

    println!("🔐 Starting OAuth authentication...");
    println!("A browser window will open - please authorize the application");
    println!();

    if open::that(&auth_url).is_err() {
        println!("(Could not open browser automatically, please open this URL)");
        println!("{}", auth_url);
    }

    let code = listener.wait_for_code(&state).await?;
    let tokens = secrets
        .exchange_code(http_client, &code, &redirect_uri)
        .await?;

    if tokens.refresh_token.is_none() {
        warn!("No refresh token returned; the notifier will stop working once the access token expires");
    }

    Ok(tokens.into_credential(secrets, Utc::now()))
}

/// List calendars and confirm watch permissions.
async fn smoke_test(
    calendar: &GoogleCalendarClient,
    credential: &Credential,
) -> shared::Result<()> {
    println!("🧪 Testing Google Calendar API access...");

    let calendars = calendar.list_calendars(credential).await?;
    println!("✅ Successfully accessed {} calendars:", calendars.len());
    for cal in calendars.iter().take(3) {
        println!(
            "   - {}",
            cal.summary.as_deref().unwrap_or("Unknown Calendar")
        );
    }
    if calendars.len() > 3 {
        println!("   ... and {} more", calendars.len() - 3);
    }

    println!();
    println!("🔗 Testing webhook permissions...");

    // The placeholder address is never verifiable, so a rejection here is the good outcome.
    let probe = WatchRequest::new(PROBE_CHANNEL_ID, PROBE_ADDRESS);
    match calendar.watch_events(credential, "primary", &probe).await {
        Err(Error::InvalidWebhookUrl(_)) | Err(Error::WebhookVerificationFailed(_)) => {
            println!("✅ Webhook permissions confirmed");
        }
        Err(e) => {
            println!("⚠️ Webhook test result: {}", e);
        }
        Ok(response) => {
            warn!(channel_id = %response.id, resource_id = %response.resource_id, "Probe channel was unexpectedly accepted");
            println!("⚠️ Webhook test unexpectedly created channel {}", response.id);
        }
    }

    Ok(())
}

async fn run() -> anyhow::Result<bool> {
    println!("🔐 GOOGLE CALENDAR OAUTH CREDENTIALS GENERATOR");
    println!("{}", "=".repeat(55));
    println!("This tool generates Lambda-compatible credentials for Google Calendar API");
    println!();

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let Some(secret_file) = find_client_secret_file(&cwd)? else {
        println!("❌ No OAuth credentials file found!");
        println!();
        print_setup_instructions();
        return Ok(false);
    };

    println!("✅ Found credentials file: {}", secret_file.display());
    println!();

    let http_client = reqwest::Client::new();
    let calendar = GoogleCalendarClient::new(http_client.clone());

    let outcome = async {
        let secrets = ClientSecrets::load(&secret_file)?;
        let credential = authenticate(&http_client, &secrets).await?;
        println!("✅ Authentication successful!");
        println!();

        smoke_test(&calendar, &credential).await?;
        Ok::<_, Error>(credential)
    }
    .await;

    let credential = match outcome {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Error during authentication: {}", e);
            println!();
            println!("🔧 TROUBLESHOOTING:");
            println!("- Make sure you've enabled Google Calendar API");
            println!("- Check OAuth consent screen is configured");
            println!("- Verify you're using Desktop application credentials");
            println!("- Try downloading credentials file again");
            return Ok(false);
        }
    };

    println!();
    println!("🔧 Generating Lambda credentials...");

    let env_line = credential.to_env_line()?;
    std::fs::write(CREDENTIALS_FILE, &env_line)
        .with_context(|| format!("Failed to write {}", CREDENTIALS_FILE))?;
    info!(file = CREDENTIALS_FILE, "Saved encoded credentials");

    println!("🎉 SUCCESS! LAMBDA CREDENTIALS GENERATED");
    println!("{}", "=".repeat(50));
    println!();
    println!("📋 NEXT STEPS:");
    println!("1. Copy the credentials below");
    println!("2. Go to your Lambda function in AWS Console");
    println!("3. Configuration → Environment variables");
    println!("4. Add/update: GOOGLE_CALENDAR_CREDENTIALS");
    println!("5. Paste the value below");
    println!();
    println!("🔑 GOOGLE_CALENDAR_CREDENTIALS:");
    println!("{}", "-".repeat(50));
    println!("{}", credential.encode()?);
    println!("{}", "-".repeat(50));
    println!();
    println!("💾 Credentials also saved to: {}", CREDENTIALS_FILE);

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
        println!("🎉 Setup complete! Continue with AWS Lambda configuration.");
        Ok(())
    } else {
        println!();
        println!("❌ Setup failed. Please resolve the issues above and try again.");
        std::process::exit(1);
    }
}
