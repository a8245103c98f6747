//! HTTP request step handler.
//!
//! Issues one templated HTTP request and records the response status and
//! parsed body as step data. Responses with status >= 400 are provider
//! errors carrying the status code, so the step's retry directive can
//! classify them.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tracing::debug;

use courier_providers::ProviderError;
use courier_types::{HttpRequestConfig, RetryConfig, Step, StepAction, StepKind};

use crate::context::ExecutionContext;
use crate::handlers::{HandlerOutcome, StepHandler};
use crate::retry::with_retry;
use crate::template::{TemplateScope, has_unresolved_placeholders, render_template, render_value};

/// Handler for `http_request` steps.
pub struct HttpRequestHandler {
    http: Client,
}

impl HttpRequestHandler {
    /// Builds the handler with a 30-second request timeout.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http handler client")?;
        Ok(Self { http })
    }

    async fn perform(
        &self,
        method: &Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        let mut request = self.http.request(method.clone(), url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%url, method = %method, "issuing http_request step call");
        let response = request.send().await?;
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();

        if status.as_u16() >= 400 {
            return Err(ProviderError::http(status.as_u16(), body_text));
        }

        let parsed: Value = serde_json::from_str(&body_text).unwrap_or(Value::String(body_text));
        Ok(json!({ "status": status.as_u16(), "body": parsed }))
    }
}

#[async_trait]
impl StepHandler for HttpRequestHandler {
    fn kind(&self) -> StepKind {
        StepKind::HttpRequest
    }

    async fn execute(&self, step: &Step, context: &ExecutionContext) -> Result<HandlerOutcome> {
        let StepAction::HttpRequest(config) = &step.action else {
            bail!("step '{}' routed to http_request handler with mismatched configuration", step.id);
        };

        let scope = TemplateScope::new(context);
        let url = render_template(&config.url, &scope);
        if has_unresolved_placeholders(&url) {
            return Ok(HandlerOutcome::failed(format!(
                "request URL contains unresolved placeholders after template resolution: '{url}'"
            )));
        }

        let Some(method) = parse_method(&config.method) else {
            return Ok(HandlerOutcome::failed(format!("unsupported HTTP method '{}'", config.method)));
        };

        let headers: Vec<(String, String)> = config
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), render_template(value, &scope)))
            .collect();
        let body = config.body.as_ref().map(|body| render_value(body, &scope));

        let outcome = match retry_config(config) {
            Some(retry) => {
                with_retry(&retry, || self.perform(&method, &url, &headers, body.as_ref()))
                    .await
                    .result
            }
            None => self.perform(&method, &url, &headers, body.as_ref()).await,
        };

        match outcome {
            Ok(data) => Ok(HandlerOutcome::completed(data)),
            Err(error) => Ok(HandlerOutcome::failed(format!("http request failed: {error}"))),
        }
    }
}

fn retry_config(config: &HttpRequestConfig) -> Option<RetryConfig> {
    config.retry.to_config()
}

fn parse_method(raw: &str) -> Option<Method> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "HEAD" => Some(Method::HEAD),
        _ => None,
    }
}
