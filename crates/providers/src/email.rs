//! Email provider client.
//!
//! [`HttpMailer`] talks to a JSON email-delivery API: one POST per message
//! with a bearer key, the configured sender address, and either an HTML or a
//! plain-text body. The [`Mailer`] trait is the seam the engine's send-email
//! handler depends on, so tests substitute an in-memory implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;

/// Explicit configuration for the email provider client.
///
/// Passed to the constructor at composition time; the client never reads
/// ambient environment state.
#[derive(Debug, Clone)]
pub struct EmailProviderConfig {
    /// Base URL of the delivery API, e.g. `https://api.mailprovider.test`.
    pub api_base: String,
    /// Bearer key presented on every request.
    pub api_key: String,
    /// Sender address stamped onto outgoing messages.
    pub from_address: String,
}

/// One outgoing email as handed over by the send-email handler.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailMessage {
    /// Recipient addresses; one personalized message carries exactly one.
    pub to: Vec<String>,
    pub subject: String,
    /// HTML body, set when the authored body contains markup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Plain-text body, set otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Capability of delivering one email message.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers `message`, returning the provider's response payload.
    async fn send(&self, message: &EmailMessage) -> Result<Value, ProviderError>;
}

/// `reqwest`-backed [`Mailer`] for HTTPS JSON email APIs.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    http: Client,
    config: EmailProviderConfig,
}

impl HttpMailer {
    /// Builds a mailer with default headers and a 30-second request timeout.
    pub fn new(config: EmailProviderConfig) -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        let authorization = format!("Bearer {}", config.api_key);
        default_headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&authorization).context("invalid email provider api key")?,
        );

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()
            .context("build email http client")?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<Value, ProviderError> {
        let url = format!("{}/emails", self.config.api_base.trim_end_matches('/'));
        debug!(%url, recipients = message.to.len(), "sending email");

        let mut payload = serde_json::to_value(message).map_err(|error| ProviderError::other(error.to_string()))?;
        if let Value::Object(map) = &mut payload {
            map.insert("from".to_string(), Value::String(self.config.from_address.clone()));
        }

        let response = self.http.post(&url).json(&payload).send().await?;
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::http(status.as_u16(), body_text));
        }

        Ok(serde_json::from_str(&body_text).unwrap_or(Value::Null))
    }
}
