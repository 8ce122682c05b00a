//! The duckchat upstream client.
//!
//! The upstream binds anti-abuse state to a short-lived VQD token issued by
//! its status endpoint; the chat endpoint requires that token on every call
//! and may rotate it in the response headers.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header;
use serde_json::json;
use tracing::debug;

use mallard_protocol::ChatTurn;

use crate::config::DuckChatConfig;
use crate::error::UpstreamError;
use crate::identity::{BrowserPool, IdentityProvider};
use crate::retry::{with_linear_backoff, LinearBackoff};
use crate::stream::{decode, FrameStream};

const STATUS_PATH: &str = "/duckchat/v1/status";
const CHAT_PATH: &str = "/duckchat/v1/chat";
const VQD_HEADER: &str = "x-vqd-4";
const VQD_ACCEPT_HEADER: &str = "x-vqd-accept";

pub struct DuckChatClient {
    http: reqwest::Client,
    config: DuckChatConfig,
    identity: Arc<dyn IdentityProvider>,
}

/// An opened chat exchange: the rotated token (if any) plus the frame stream.
pub struct ChatExchange {
    /// Replacement token from the response's `x-vqd-4` header, when present.
    pub refreshed_token: Option<String>,
    pub frames: FrameStream,
}

impl std::fmt::Debug for ChatExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatExchange")
            .field("refreshed_token", &self.refreshed_token)
            .field("frames", &"<stream>")
            .finish()
    }
}

impl DuckChatClient {
    pub fn new(config: DuckChatConfig) -> Result<Self, UpstreamError> {
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(BrowserPool::new(config.user_agents.clone()));
        Self::with_identity(config, identity)
    }

    pub fn with_identity(
        config: DuckChatConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            identity,
        })
    }

    pub fn config(&self) -> &DuckChatConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url_trimmed(), path)
    }

    /// Fetch a fresh VQD token, retrying per the configured policy.
    pub async fn acquire_token(&self) -> Result<String, UpstreamError> {
        let policy = LinearBackoff {
            retries: self.config.token_retries,
            step: Duration::from_millis(self.config.token_backoff_step_ms),
        };
        with_linear_backoff(&policy, || self.fetch_token()).await
    }

    async fn fetch_token(&self) -> Result<String, UpstreamError> {
        let response = self
            .http
            .get(self.url(STATUS_PATH))
            .header(VQD_ACCEPT_HEADER, "1")
            .header(header::USER_AGENT, self.identity.user_agent())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
            });
        }

        response
            .headers()
            .get(VQD_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or(UpstreamError::TokenUnavailable)
    }

    /// POST the full turn history and return the raw upstream response.
    pub async fn dispatch(
        &self,
        token: &str,
        turns: &[ChatTurn],
        model: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let origin = self.config.base_url_trimmed().to_string();
        let response = self
            .http
            .post(self.url(CHAT_PATH))
            .header(VQD_HEADER, token)
            .header(header::USER_AGENT, self.identity.user_agent())
            .header(header::ORIGIN, origin.as_str())
            .header(header::REFERER, format!("{}/", origin))
            .json(&json!({ "model": model, "messages": turns }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// One full exchange: dispatch, capture the rotated token, open the
    /// decoded frame stream.
    pub async fn chat(
        &self,
        token: &str,
        turns: &[ChatTurn],
        model: &str,
    ) -> Result<ChatExchange, UpstreamError> {
        let response = self.dispatch(token, turns, model).await?;

        let refreshed_token = response
            .headers()
            .get(VQD_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        debug!(
            model,
            turns = turns.len(),
            rotated = refreshed_token.is_some(),
            "duckchat exchange opened"
        );

        let frames = decode(response.bytes_stream(), self.config.dialect);
        Ok(ChatExchange {
            refreshed_token,
            frames,
        })
    }
}
