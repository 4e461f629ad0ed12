//! HTTP client for the refresh and heartbeat endpoints

use crate::config::SessionConfig;
use crate::error::{RefreshError, SessionError};
use crate::heartbeat::HeartbeatTransport;
use crate::scheduler::SessionApi;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server returned another error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Success status but the body was not what we expected
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 => Self::AuthenticationFailed(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<ClientError> for RefreshError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthenticationFailed(_) => Self::Rejected,
            other => Self::Transient(other.to_string()),
        }
    }
}

impl From<ClientError> for SessionError {
    fn from(err: ClientError) -> Self {
        Self::transport(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Client for the session endpoints
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    base_url: String,
}

impl SessionClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a client for the backend named in `config`
    pub fn from_config(config: &SessionConfig) -> Result<Self, ClientError> {
        Self::new(config.backend_url.clone())
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of the refresh endpoint
    pub fn refresh_url(&self) -> String {
        format!("{}{}", self.base_url, SessionConfig::REFRESH_PATH)
    }

    /// Full URL of the heartbeat endpoint
    pub fn heartbeat_url(&self) -> String {
        format!("{}{}", self.base_url, SessionConfig::HEARTBEAT_PATH)
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        let request = self.client.post(url);

        // Session cookies ride along with the bearer token in browsers.
        #[cfg(target_arch = "wasm32")]
        let request = request.fetch_credentials_include();

        request
    }

    /// Exchange `current` for a renewed token
    pub async fn refresh_token(&self, current: &str) -> Result<String, ClientError> {
        let response = self
            .post(self.refresh_url())
            .bearer_auth(current)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ClientError::from_status(status, message));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;
        if body.token.is_empty() {
            return Err(ClientError::MalformedResponse("empty token".to_string()));
        }
        Ok(body.token)
    }

    /// Notify the backend that the session is alive; the response is ignored
    pub async fn send_heartbeat(&self) -> Result<(), ClientError> {
        self.post(self.heartbeat_url()).send().await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl SessionApi for SessionClient {
    async fn refresh(&self, current: &str) -> Result<String, RefreshError> {
        Ok(self.refresh_token(current).await?)
    }
}

#[async_trait(?Send)]
impl HeartbeatTransport for SessionClient {
    async fn send(&self) -> crate::error::Result<()> {
        Ok(self.send_heartbeat().await?)
    }
}

/// Builder for SessionClient
#[derive(Default)]
pub struct SessionClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl SessionClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout (ignored on wasm, where fetch has none)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent (native only)
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let base_url = self
            .base_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        #[allow(unused_mut)]
        let mut client_builder = ClientBuilder::new();

        // Browsers control the user agent and have no client-wide timeout.
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Some(timeout) = self.timeout {
                client_builder = client_builder.timeout(timeout);
            }
            let user_agent = self
                .user_agent
                .unwrap_or_else(|| format!("tabsession/{}", env!("CARGO_PKG_VERSION")));
            client_builder = client_builder.user_agent(user_agent);
        }

        #[cfg(target_arch = "wasm32")]
        let _ = (self.timeout, self.user_agent);

        let client = client_builder.build()?;

        Ok(SessionClient { client, base_url })
    }
}
