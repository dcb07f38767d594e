//! Session token exchange against the console API.
//!
//! One `POST {console}/session-tokens` with the API key in `X-Api-Key`
//! exchanges credentials for a short-lived session token. All
//! configuration preconditions are checked before any I/O, each as a
//! distinct failure. The client issues exactly one request per call and
//! may be invoked again later to refresh an expired token.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{Result, SdkError};

const SESSION_TOKEN_PATH: &str = "/session-tokens";

#[derive(Debug, Serialize)]
struct SessionTokenRequest {
    #[serde(rename = "expireAt")]
    expire_at: i64,
    #[serde(rename = "modelVersion", skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionTokenResponse {
    #[serde(rename = "sessionToken", default)]
    session_token: String,
    #[serde(default)]
    errors: Vec<TokenErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorEntry {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    code: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

/// HTTP client for the console session-token exchange.
pub struct TokenClient {
    http: Client,
    endpoint: String,
    api_key: String,
    expire_at: DateTime<Utc>,
    model_version: Option<String>,
}

impl TokenClient {
    /// Build a token client from the session configuration.
    ///
    /// Fails fast, before any I/O, when a required field is missing.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(SdkError::Config("missing API key".to_string()));
        }
        if config.console_endpoint.is_empty() {
            return Err(SdkError::Config("missing console endpoint URL".to_string()));
        }
        let Some(expire_at) = config.expire_at else {
            return Err(SdkError::Config("missing expireAt".to_string()));
        };

        let endpoint = format!(
            "{}{}",
            config.console_endpoint.trim_end_matches('/'),
            SESSION_TOKEN_PATH
        );

        Ok(Self {
            http: Client::new(),
            endpoint,
            api_key: config.api_key.clone(),
            expire_at,
            model_version: config.model_version.clone(),
        })
    }

    /// Issue one token request and return the session token.
    pub async fn issue(&self) -> Result<String> {
        let payload = SessionTokenRequest {
            expire_at: self.expire_at.timestamp(),
            model_version: self.model_version.clone(),
        };

        tracing::debug!(endpoint = %self.endpoint, "requesting session token");

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SdkError::TokenStatus(status.as_u16()));
        }

        let parsed: SessionTokenResponse = serde_json::from_str(&body)?;

        if !parsed.errors.is_empty() {
            return Err(SdkError::TokenRejected(format_token_error(
                status.as_u16(),
                &parsed,
            )));
        }
        if parsed.session_token.is_empty() {
            return Err(SdkError::EmptyToken);
        }

        Ok(parsed.session_token)
    }
}

/// Format the first service-reported error entry as
/// `Error <status> (<code>): <title> - <detail>`.
fn format_token_error(status: u16, response: &SessionTokenResponse) -> String {
    match response.errors.first() {
        Some(err) => format!(
            "Error {} ({}): {} - {}",
            err.status, err.code, err.title, err.detail
        ),
        None => format!("unknown error with status {status}"),
    }
}
