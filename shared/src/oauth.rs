//! Installed-app OAuth flow used by the credential generator.
//!
//! Client secrets come from the JSON file Google Cloud Console hands out; the
//! authorization code arrives on a one-shot loopback listener.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

use crate::credentials::{Credential, DEFAULT_TOKEN_URI, SCOPES};
use crate::google::classify_provider_error;
use crate::{Error, Result};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Name the console suggests when saving the file by hand.
const PREFERRED_SECRET_FILE: &str = "credentials.json";

const CALLBACK_PAGE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/html\r\n\
    Connection: close\r\n\
    \r\n\
    <html><body>\
    <h1>Authentication successful!</h1>\
    <p>You can close this window and return to the terminal.</p>\
    </body></html>";

/// OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Downloaded client-secret file; desktop clients use `installed`, web clients `web`.
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn parse(json: &str) -> Result<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::Config(
                "client secret file has neither an 'installed' nor a 'web' section".to_string(),
            )
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Consent URL for an offline (refresh-token) grant.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        let scopes = SCOPES.join(" ");

        format!(
            "{}?\
            client_id={}&\
            redirect_uri={}&\
            response_type=code&\
            scope={}&\
            access_type=offline&\
            prompt=consent&\
            state={}",
            self.auth_uri,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        http_client: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let params = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_provider_error(status, &body));
        }

        Ok(response.json().await?)
    }
}

/// Google OAuth token response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    /// Space-separated granted scopes
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn into_credential(self, secrets: &ClientSecrets, now: DateTime<Utc>) -> Credential {
        let scopes = match self.scope {
            Some(scope) => scope.split_whitespace().map(String::from).collect(),
            None => SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let mut credential = Credential {
            token: None,
            refresh_token: self.refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: Some(scopes),
            expiry: None,
        };
        credential.apply_refresh(self.access_token, self.expires_in, now);
        credential
    }
}

/// Locate the client-secret file in `dir`.
///
/// `credentials.json` wins; otherwise the first `client_secret_*.json` by name.
pub fn find_client_secret_file(dir: &Path) -> Result<Option<PathBuf>> {
    let preferred = dir.join(PREFERRED_SECRET_FILE);
    if preferred.is_file() {
        return Ok(Some(preferred));
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("client_secret_") && n.ends_with(".json"))
        })
        .collect();

    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Query parameters of the OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Parse the request line of the OAuth redirect, e.g. `GET /?code=..&state=.. HTTP/1.1`.
pub fn parse_callback(request_line: &str) -> Result<CallbackParams> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::Validation("Invalid HTTP request".to_string()))?;

    let url = Url::parse(&format!("http://localhost{}", target))
        .map_err(|e| Error::Validation(format!("Invalid callback URL: {}", e)))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    if let Some(error) = param("error") {
        return Err(Error::CredentialInvalid(format!(
            "authorization was denied: {}",
            error
        )));
    }

    let code = param("code").ok_or_else(|| Error::Validation("No code in callback".to_string()))?;
    let state =
        param("state").ok_or_else(|| Error::Validation("No state in callback".to_string()))?;

    Ok(CallbackParams { code, state })
}

/// Loopback listener receiving the OAuth redirect.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Bind an ephemeral port on 127.0.0.1.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.port)
    }

    /// Accept one redirect and check its `state`.
    pub async fn wait_for_code(self, expected_state: &str) -> Result<String> {
        let (stream, _) = self.listener.accept().await?;

        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        let params = parse_callback(&request_line);

        let mut stream = reader.into_inner();
        stream.write_all(CALLBACK_PAGE.as_bytes()).await?;
        stream.flush().await?;

        let params = params?;
        if params.state != expected_state {
            return Err(Error::CredentialInvalid(
                "OAuth state mismatch in callback".to_string(),
            ));
        }

        info!("Received authorization code");
        Ok(params.code)
    }
}
