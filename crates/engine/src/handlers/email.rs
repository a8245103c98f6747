//! Send-email step handler.
//!
//! Routes structured recipient specs through the recipient resolver and the
//! legacy single `to` field through free-text resolution (after template
//! rendering — a `to` that still contains placeholders is a configuration
//! error, never a silent send). Multi-recipient structured sends are
//! personalized one message per recipient unless explicitly disabled.

use anyhow::{Result, bail};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map as JsonMap, Value, json};
use tracing::{debug, info};

use courier_providers::{EmailMessage, Mailer, ProviderError};
use courier_types::{ContactInfo, ResolvedRecipients, RetryConfig, SendEmailConfig, Step, StepAction, StepKind};

use crate::context::ExecutionContext;
use crate::handlers::{HandlerOutcome, StepHandler};
use crate::recipients::RecipientResolver;
use crate::retry::with_retry;
use crate::template::{TemplateScope, has_unresolved_placeholders, render_template};

/// Angle-bracket markup check used to classify the body as HTML.
static HTML_MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[a-zA-Z][^>]*>").expect("valid markup regex"));

/// Handler for `send_email` steps.
pub struct SendEmailHandler {
    mailer: std::sync::Arc<dyn Mailer>,
    recipients: RecipientResolver,
}

impl SendEmailHandler {
    pub fn new(mailer: std::sync::Arc<dyn Mailer>, recipients: RecipientResolver) -> Self {
        Self { mailer, recipients }
    }

    async fn resolve_recipients(
        &self,
        config: &SendEmailConfig,
        context: &ExecutionContext,
    ) -> Result<Result<ResolvedRecipients, HandlerOutcome>> {
        let owner_id = context.workflow.owner_id.as_str();
        let scope = TemplateScope::new(context);

        if let Some(spec) = &config.recipients {
            return Ok(match self.recipients.resolve(owner_id, spec).await {
                Ok(resolved) => Ok(resolved),
                Err(error) => Err(HandlerOutcome::failed(format!("recipient resolution failed: {error:#}"))),
            });
        }

        if let Some(to) = &config.to {
            let rendered = render_template(to, &scope);
            if has_unresolved_placeholders(&rendered) {
                return Ok(Err(HandlerOutcome::failed(format!(
                    "recipient field 'to' contains unresolved placeholders after template resolution: '{rendered}'"
                ))));
            }
            return Ok(match self.recipients.resolve_from_text(owner_id, &rendered).await {
                Ok(resolved) => Ok(resolved),
                Err(error) => Err(HandlerOutcome::failed(error.to_string())),
            });
        }

        Ok(Err(HandlerOutcome::failed(
            "send_email step requires either 'recipients' or 'to'",
        )))
    }

    async fn deliver(
        &self,
        message: &EmailMessage,
        retry_config: Option<&RetryConfig>,
    ) -> Result<Value, ProviderError> {
        match retry_config {
            Some(config) => {
                let outcome = with_retry(config, || self.mailer.send(message)).await;
                debug!(attempts = outcome.attempts, delay_ms = outcome.total_delay.as_millis() as u64, "email delivery finished");
                outcome.result
            }
            None => self.mailer.send(message).await,
        }
    }
}

#[async_trait]
impl StepHandler for SendEmailHandler {
    fn kind(&self) -> StepKind {
        StepKind::SendEmail
    }

    async fn execute(&self, step: &Step, context: &ExecutionContext) -> Result<HandlerOutcome> {
        let StepAction::SendEmail(config) = &step.action else {
            bail!("step '{}' routed to send_email handler with mismatched configuration", step.id);
        };

        if config.subject.trim().is_empty() {
            return Ok(HandlerOutcome::failed("send_email step is missing 'subject'"));
        }
        if config.body.trim().is_empty() {
            return Ok(HandlerOutcome::failed("send_email step is missing 'body'"));
        }

        let resolved = match self.resolve_recipients(config, context).await? {
            Ok(resolved) => resolved,
            Err(outcome) => return Ok(outcome),
        };
        if resolved.is_empty() {
            return Ok(HandlerOutcome::failed("no recipients resolved for send_email step"));
        }

        let retry_config = config.retry.to_config();
        let personalize = config.recipients.is_some() && resolved.contacts.len() > 1 && config.personalize != Some(false);

        if personalize {
            let mut sent = 0u32;
            for contact in &resolved.contacts {
                let overlay = contact_overlay(contact);
                let scope = TemplateScope::with_overlay(context, &overlay);
                let message = build_message(
                    vec![contact.email.clone()],
                    render_template(&config.subject, &scope),
                    render_template(&config.body, &scope),
                );

                if let Err(error) = self.deliver(&message, retry_config.as_ref()).await {
                    return Ok(HandlerOutcome::failed(format!(
                        "failed sending to '{}' after {sent} successful deliveries: {error}",
                        contact.email
                    )));
                }
                sent += 1;
            }

            info!(step_id = %step.id, sent, "personalized email fan-out delivered");
            return Ok(HandlerOutcome::completed(json!({
                "sent": sent,
                "personalized": true,
                "recipients": resolved.emails,
            })));
        }

        let scope = TemplateScope::new(context);
        let message = build_message(
            resolved.emails.clone(),
            render_template(&config.subject, &scope),
            render_template(&config.body, &scope),
        );

        match self.deliver(&message, retry_config.as_ref()).await {
            Ok(response) => {
                info!(step_id = %step.id, recipients = resolved.emails.len(), "email delivered");
                Ok(HandlerOutcome::completed(json!({
                    "sent": 1,
                    "personalized": false,
                    "recipients": resolved.emails,
                    "provider_response": response,
                })))
            }
            Err(error) => Ok(HandlerOutcome::failed(format!("email delivery failed: {error}"))),
        }
    }
}

fn contact_overlay(contact: &ContactInfo) -> JsonMap<String, Value> {
    let mut overlay = JsonMap::new();
    overlay.insert(
        "contact".to_string(),
        json!({
            "id": contact.id,
            "name": contact.name,
            "email": contact.email,
            "department": contact.department,
            "tags": contact.tags,
        }),
    );
    overlay
}

fn build_message(to: Vec<String>, subject: String, body: String) -> EmailMessage {
    if HTML_MARKUP_RE.is_match(&body) {
        EmailMessage {
            to,
            subject,
            html: Some(body),
            text: None,
        }
    } else {
        EmailMessage {
            to,
            subject,
            html: None,
            text: Some(body),
        }
    }
}
