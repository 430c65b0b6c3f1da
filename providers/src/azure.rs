//! Azure OpenAI provider: `async-openai`'s `AzureConfig`, which routes by
//! deployment id rather than model id (SPEC_FULL.md §4.9).

use async_openai::config::AzureConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use common::error::EngineError;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::openai_compatible::TimeoutClass;
use crate::retry::retry_transient;
use crate::traits::{ChatRequest, ChatRole, LlmProvider, TextStream};

pub struct AzureProvider {
    client: Client<AzureConfig>,
}

impl AzureProvider {
    /// `deployment_id` is passed as the model field of every request —
    /// Azure resolves it against the resource's deployment, not a global
    /// model catalog.
    pub fn new(api_key: String, api_base: String, api_version: String, deployment_id: String) -> Self {
        let cfg = AzureConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base)
            .with_api_version(api_version)
            .with_deployment_id(deployment_id);
        Self {
            client: Client::with_config(cfg),
        }
    }
}

fn to_openai_messages(
    messages: &[crate::traits::ChatMessage],
) -> Result<Vec<ChatCompletionRequestMessage>, EngineError> {
    messages
        .iter()
        .map(|m| -> Result<ChatCompletionRequestMessage, EngineError> {
            Ok(match m.role {
                ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| EngineError::Internal(e.to_string()))?
                    .into(),
                ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| EngineError::Internal(e.to_string()))?
                    .into(),
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(|e| EngineError::Internal(e.to_string()))?
                    .into(),
            })
        })
        .collect()
}

#[async_trait]
impl LlmProvider for AzureProvider {
    fn provider_id(&self) -> &'static str {
        "azure"
    }

    async fn acall(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TextStream, EngineError> {
        let messages = to_openai_messages(&request.messages)?;
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&request.model_id).messages(messages).stream(true);
        if let Some(t) = request.params.temperature {
            builder.temperature(t);
        }
        if let Some(p) = request.params.top_p {
            builder.top_p(p);
        }
        if let Some(m) = request.params.max_tokens {
            builder.max_tokens(m);
        }
        let req = builder
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let timeout = TimeoutClass::Remote.duration();
        let client = self.client.clone();
        let stream = retry_transient(|| {
            let client = client.clone();
            let req = req.clone();
            async move {
                tokio::time::timeout(timeout, client.chat().create_stream(req))
                    .await
                    .map_err(|_| EngineError::ProviderTransient("request timed out".to_string()))?
                    .map_err(|e| EngineError::from_provider_message(e.to_string()))
            }
        })
        .await?;

        let out = async_stream::stream! {
            tokio::pin!(stream);
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                match stream.next().await {
                    None => break,
                    Some(Err(e)) => {
                        yield Err(EngineError::from_provider_message(e.to_string()));
                        break;
                    }
                    Some(Ok(resp)) => {
                        for choice in resp.choices {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(content);
                                }
                            }
                        }
                    }
                }
            }
        };
        Ok(Box::pin(out))
    }
}
