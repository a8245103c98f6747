//! Send-chat-message step handler.
//!
//! Two delivery modes: an OAuth integration (channel post with the stored
//! access token, falling back to the integration's stored webhook URL when
//! no token is present) or a direct webhook URL supplied on the step.
//! Provider error bodies are reported verbatim.

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use courier_providers::{ChatPoster, ProviderError};
use courier_types::{RetryConfig, SendChatConfig, Step, StepAction, StepKind};

use crate::context::ExecutionContext;
use crate::handlers::{HandlerOutcome, StepHandler};
use crate::retry::with_retry;
use crate::store::IntegrationStore;
use crate::template::{TemplateScope, render_template};

/// Handler for `send_chat_message` steps.
pub struct SendChatMessageHandler {
    chat: Arc<dyn ChatPoster>,
    integrations: Arc<dyn IntegrationStore>,
}

enum Delivery {
    Channel { access_token: String, channel: String },
    Webhook { url: String },
}

impl SendChatMessageHandler {
    pub fn new(chat: Arc<dyn ChatPoster>, integrations: Arc<dyn IntegrationStore>) -> Self {
        Self { chat, integrations }
    }

    /// Decides the delivery mode, or reports the configuration problem that
    /// prevents one.
    async fn delivery_for(&self, config: &SendChatConfig, owner_id: &str) -> Result<Result<Delivery, HandlerOutcome>> {
        if let Some(integration_id) = &config.integration_id {
            let Some(integration) = self.integrations.chat_integration(owner_id, integration_id).await? else {
                return Ok(Err(HandlerOutcome::failed(format!(
                    "chat integration '{integration_id}' not found"
                ))));
            };

            if let Some(access_token) = integration.access_token {
                let Some(channel) = config.channel.clone().or(integration.default_channel) else {
                    return Ok(Err(HandlerOutcome::failed(format!(
                        "no channel configured for chat integration '{integration_id}'"
                    ))));
                };
                return Ok(Ok(Delivery::Channel { access_token, channel }));
            }

            if let Some(url) = integration.webhook_url {
                debug!(%integration_id, "integration has no access token, using its stored webhook");
                return Ok(Ok(Delivery::Webhook { url }));
            }

            return Ok(Err(HandlerOutcome::failed(format!(
                "chat integration '{integration_id}' has neither an access token nor a webhook URL"
            ))));
        }

        if let Some(url) = &config.webhook_url {
            return Ok(Ok(Delivery::Webhook { url: url.clone() }));
        }

        Ok(Err(HandlerOutcome::failed(
            "send_chat_message step requires an 'integration_id' or a 'webhook_url'",
        )))
    }

    async fn deliver(&self, delivery: &Delivery, text: &str, retry_config: Option<&RetryConfig>) -> Result<Value, ProviderError> {
        let post = || async {
            match delivery {
                Delivery::Channel { access_token, channel } => {
                    self.chat.post_channel_message(access_token, channel, text).await
                }
                Delivery::Webhook { url } => self.chat.post_webhook(url, text).await,
            }
        };

        match retry_config {
            Some(config) => with_retry(config, post).await.result,
            None => post().await,
        }
    }
}

#[async_trait]
impl StepHandler for SendChatMessageHandler {
    fn kind(&self) -> StepKind {
        StepKind::SendChatMessage
    }

    async fn execute(&self, step: &Step, context: &ExecutionContext) -> Result<HandlerOutcome> {
        let StepAction::SendChatMessage(config) = &step.action else {
            bail!("step '{}' routed to send_chat_message handler with mismatched configuration", step.id);
        };

        if config.message.trim().is_empty() {
            return Ok(HandlerOutcome::failed("send_chat_message step is missing 'message'"));
        }

        let delivery = match self.delivery_for(config, &context.workflow.owner_id).await? {
            Ok(delivery) => delivery,
            Err(outcome) => return Ok(outcome),
        };

        let scope = TemplateScope::new(context);
        let text = render_template(&config.message, &scope);
        let retry_config = config.retry.to_config();

        match self.deliver(&delivery, &text, retry_config.as_ref()).await {
            Ok(response) => {
                let mode = match &delivery {
                    Delivery::Channel { channel, .. } => json!({"mode": "channel", "channel": channel}),
                    Delivery::Webhook { .. } => json!({"mode": "webhook"}),
                };
                info!(step_id = %step.id, "chat message delivered");
                Ok(HandlerOutcome::completed(json!({
                    "delivery": mode,
                    "provider_response": response,
                })))
            }
            Err(error) => Ok(HandlerOutcome::failed(format!("chat delivery failed: {error}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::store::{ChatIntegration, MemoryIntegrationStore};
    use courier_types::{RunUser, StepStatus, WorkflowInput};

    #[derive(Default)]
    struct RecordingChat {
        channel_posts: Mutex<Vec<(String, String, String)>>,
        webhook_posts: Mutex<Vec<(String, String)>>,
        fail_with: Option<ProviderError>,
    }

    #[async_trait]
    impl ChatPoster for RecordingChat {
        async fn post_channel_message(&self, access_token: &str, channel: &str, text: &str) -> Result<Value, ProviderError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            self.channel_posts
                .lock()
                .expect("lock")
                .push((access_token.into(), channel.into(), text.into()));
            Ok(json!({"ok": true}))
        }

        async fn post_webhook(&self, webhook_url: &str, text: &str) -> Result<Value, ProviderError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            self.webhook_posts.lock().expect("lock").push((webhook_url.into(), text.into()));
            Ok(json!("ok"))
        }
    }

    fn context() -> ExecutionContext {
        let workflow = WorkflowInput {
            id: "wf".into(),
            name: "Demo".into(),
            owner_id: "owner".into(),
            steps: vec![],
            trigger_step_id: None,
        };
        let user = RunUser {
            id: "u1".into(),
            email: "owner@example.com".into(),
            name: Some("Owner".into()),
        };
        ExecutionContext::new(&workflow, &user, "run-1", None)
    }

    fn chat_step(config: SendChatConfig) -> Step {
        Step {
            id: "notify".into(),
            name: "Notify channel".into(),
            description: None,
            position: 1,
            action: StepAction::SendChatMessage(config),
        }
    }

    fn integration_store(integration: ChatIntegration) -> Arc<MemoryIntegrationStore> {
        Arc::new(MemoryIntegrationStore::new().with_integration("owner", integration))
    }

    #[tokio::test]
    async fn posts_to_channel_with_integration_token() {
        let chat = Arc::new(RecordingChat::default());
        let store = integration_store(ChatIntegration {
            id: "int-1".into(),
            access_token: Some("xoxb-token".into()),
            default_channel: Some("#general".into()),
            webhook_url: None,
        });
        let handler = SendChatMessageHandler::new(chat.clone(), store);
        let step = chat_step(SendChatConfig {
            integration_id: Some("int-1".into()),
            message: "Run {{run_id}} finished".into(),
            ..Default::default()
        });

        let outcome = handler.execute(&step, &context()).await.expect("execute");
        assert_eq!(outcome.status, StepStatus::Completed);

        let posts = chat.channel_posts.lock().expect("lock");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1, "#general");
        assert_eq!(posts[0].2, "Run run-1 finished");
    }

    #[tokio::test]
    async fn step_channel_overrides_integration_default() {
        let chat = Arc::new(RecordingChat::default());
        let store = integration_store(ChatIntegration {
            id: "int-1".into(),
            access_token: Some("xoxb-token".into()),
            default_channel: Some("#general".into()),
            webhook_url: None,
        });
        let handler = SendChatMessageHandler::new(chat.clone(), store);
        let step = chat_step(SendChatConfig {
            integration_id: Some("int-1".into()),
            channel: Some("#alerts".into()),
            message: "hi".into(),
            ..Default::default()
        });

        handler.execute(&step, &context()).await.expect("execute");
        assert_eq!(chat.channel_posts.lock().expect("lock")[0].1, "#alerts");
    }

    #[tokio::test]
    async fn tokenless_integration_falls_back_to_its_webhook() {
        let chat = Arc::new(RecordingChat::default());
        let store = integration_store(ChatIntegration {
            id: "int-1".into(),
            access_token: None,
            default_channel: None,
            webhook_url: Some("https://hooks.test/abc".into()),
        });
        let handler = SendChatMessageHandler::new(chat.clone(), store);
        let step = chat_step(SendChatConfig {
            integration_id: Some("int-1".into()),
            message: "hi".into(),
            ..Default::default()
        });

        let outcome = handler.execute(&step, &context()).await.expect("execute");
        assert_eq!(outcome.status, StepStatus::Completed);
        assert_eq!(chat.webhook_posts.lock().expect("lock")[0].0, "https://hooks.test/abc");
    }

    #[tokio::test]
    async fn direct_webhook_mode_needs_no_integration() {
        let chat = Arc::new(RecordingChat::default());
        let handler = SendChatMessageHandler::new(chat.clone(), Arc::new(MemoryIntegrationStore::new()));
        let step = chat_step(SendChatConfig {
            webhook_url: Some("https://hooks.test/direct".into()),
            message: "hi".into(),
            ..Default::default()
        });

        let outcome = handler.execute(&step, &context()).await.expect("execute");
        assert_eq!(outcome.status, StepStatus::Completed);
        assert_eq!(chat.webhook_posts.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn provider_error_body_is_reported_verbatim() {
        let chat = Arc::new(RecordingChat {
            fail_with: Some(ProviderError::other(r#"{"ok":false,"error":"channel_not_found"}"#)),
            ..Default::default()
        });
        let handler = SendChatMessageHandler::new(chat, Arc::new(MemoryIntegrationStore::new()));
        let step = chat_step(SendChatConfig {
            webhook_url: Some("https://hooks.test/direct".into()),
            message: "hi".into(),
            ..Default::default()
        });

        let outcome = handler.execute(&step, &context()).await.expect("execute");
        assert_eq!(outcome.status, StepStatus::Failed);
        assert!(outcome.error.as_deref().expect("error").contains("channel_not_found"));
    }

    #[tokio::test]
    async fn unknown_integration_fails_descriptively() {
        let chat = Arc::new(RecordingChat::default());
        let handler = SendChatMessageHandler::new(chat, Arc::new(MemoryIntegrationStore::new()));
        let step = chat_step(SendChatConfig {
            integration_id: Some("missing".into()),
            message: "hi".into(),
            ..Default::default()
        });

        let outcome = handler.execute(&step, &context()).await.expect("execute");
        assert_eq!(outcome.status, StepStatus::Failed);
        assert!(outcome.error.as_deref().expect("error").contains("'missing' not found"));
    }
}
