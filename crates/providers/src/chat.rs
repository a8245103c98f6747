//! Chat provider client.
//!
//! Two delivery paths are supported, mirroring the two modes of the
//! send-chat-message handler:
//!
//! - **channel post**: an OAuth access token calls the provider's
//!   channel-post endpoint; the provider signals application-level failure
//!   through an `ok: false` field even on HTTP 200.
//! - **webhook post**: a pre-shared webhook URL receives the message text
//!   directly.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::ProviderError;

/// Explicit configuration for the chat provider client.
#[derive(Debug, Clone)]
pub struct ChatProviderConfig {
    /// Base URL of the channel-post API, e.g. `https://chat.provider.test/api`.
    pub api_base: String,
}

/// Capability of posting one chat message.
#[async_trait]
pub trait ChatPoster: Send + Sync {
    /// Posts `text` to `channel` using an OAuth access token.
    async fn post_channel_message(&self, access_token: &str, channel: &str, text: &str) -> Result<Value, ProviderError>;

    /// Posts `text` directly to a pre-shared webhook URL.
    async fn post_webhook(&self, webhook_url: &str, text: &str) -> Result<Value, ProviderError>;
}

/// `reqwest`-backed [`ChatPoster`].
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    http: Client,
    config: ChatProviderConfig,
}

impl ChatApiClient {
    /// Builds a chat client with a 30-second request timeout.
    pub fn new(config: ChatProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build chat http client")?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ChatPoster for ChatApiClient {
    async fn post_channel_message(&self, access_token: &str, channel: &str, text: &str) -> Result<Value, ProviderError> {
        let url = format!("{}/chat.postMessage", self.config.api_base.trim_end_matches('/'));
        debug!(%url, %channel, "posting channel message");

        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ProviderError::http(status.as_u16(), body_text));
        }

        let body: Value = serde_json::from_str(&body_text).unwrap_or(Value::Null);
        if body.get("ok").and_then(Value::as_bool) == Some(false) {
            // Application-level rejection delivered over HTTP 200; surface the
            // provider body verbatim so the caller sees the real reason.
            return Err(ProviderError::other(body_text));
        }

        Ok(body)
    }

    async fn post_webhook(&self, webhook_url: &str, text: &str) -> Result<Value, ProviderError> {
        validate_webhook_url(webhook_url)?;
        debug!(url = %webhook_url, "posting webhook message");

        let response = self.http.post(webhook_url).json(&json!({ "text": text })).send().await?;
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ProviderError::http(status.as_u16(), body_text));
        }

        Ok(serde_json::from_str(&body_text).unwrap_or(Value::String(body_text)))
    }
}

/// Webhook URLs come from stored step configuration; require an absolute
/// http(s) URL before sending anything to them.
fn validate_webhook_url(raw_url: &str) -> Result<(), ProviderError> {
    let parsed = Url::parse(raw_url).map_err(|error| ProviderError::other(format!("invalid webhook URL '{raw_url}': {error}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ProviderError::other(format!(
            "webhook URL '{raw_url}' must use http or https, got '{other}://'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::validate_webhook_url;

    #[test]
    fn webhook_url_must_be_absolute_http() {
        assert!(validate_webhook_url("https://hooks.provider.test/T000/B000").is_ok());
        assert!(validate_webhook_url("ftp://hooks.provider.test/x").is_err());
        assert!(validate_webhook_url("not a url").is_err());
    }
}
