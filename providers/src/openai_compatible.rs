//! Provider family for every backend that speaks the OpenAI chat/embedding
//! wire format: the OpenAI API itself, OpenRouter (managed multi-provider
//! gateway), DashScope (OpenAI-compatible surface), an arbitrary
//! self-hosted "private model" endpoint, and Ollama (local-server family).
//!
//! Grounded on the teacher's `async_openai::Client` usage in
//! `common/src/utils/embedding.rs`; generalized here with a configurable
//! base URL per SPEC_FULL.md §4.9's provider table.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs, EmbeddingInput,
};
use async_openai::Client;
use async_trait::async_trait;
use common::error::EngineError;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::retry::retry_transient;
use crate::traits::{ChatRequest, ChatRole, EmbedProvider, LlmProvider, TextStream};

/// Wall-clock timeout applied to a single provider attempt. Local-server
/// families (Ollama) get a much longer budget since cold model loads
/// dominate; everything else uses the 30s remote default (§5 "Timeouts").
#[derive(Clone, Copy, Debug)]
pub enum TimeoutClass {
    Remote,
    LocalServer,
}

impl TimeoutClass {
    pub(crate) fn duration(self) -> std::time::Duration {
        match self {
            TimeoutClass::Remote => std::time::Duration::from_secs(30),
            TimeoutClass::LocalServer => std::time::Duration::from_secs(300),
        }
    }
}

pub struct OpenAiCompatibleProvider {
    provider_id: &'static str,
    client: Client<OpenAIConfig>,
    timeout_class: TimeoutClass,
}

impl OpenAiCompatibleProvider {
    /// `base_url = None` selects the official OpenAI API; any other
    /// provider in this family supplies its own base URL (OpenRouter's
    /// gateway, DashScope's compatible-mode endpoint, a private model's
    /// self-hosted address, or Ollama's local server).
    pub fn new(
        provider_id: &'static str,
        api_key: Option<String>,
        base_url: Option<String>,
        timeout_class: TimeoutClass,
    ) -> Self {
        let mut cfg = OpenAIConfig::new();
        if let Some(key) = api_key {
            cfg = cfg.with_api_key(key);
        }
        if let Some(base) = base_url {
            cfg = cfg.with_api_base(base);
        }
        Self {
            provider_id,
            client: Client::with_config(cfg),
            timeout_class,
        }
    }

    pub fn openai(api_key: String) -> Self {
        Self::new("openai", Some(api_key), None, TimeoutClass::Remote)
    }

    pub fn openrouter(api_key: String) -> Self {
        Self::new(
            "openrouter",
            Some(api_key),
            Some("https://openrouter.ai/api/v1".to_string()),
            TimeoutClass::Remote,
        )
    }

    pub fn dashscope(api_key: String) -> Self {
        Self::new(
            "dashscope",
            Some(api_key),
            Some("https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()),
            TimeoutClass::Remote,
        )
    }

    pub fn private_model(api_key: Option<String>, base_url: String) -> Self {
        Self::new("private_model", api_key, Some(base_url), TimeoutClass::Remote)
    }

    pub fn ollama(base_url: String) -> Self {
        Self::new(
            "ollama",
            Some("ollama".to_string()),
            Some(base_url),
            TimeoutClass::LocalServer,
        )
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
impl LlmProvider for OpenAiCompatibleProvider {
    fn provider_id(&self) -> &'static str {
        self.provider_id
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

        let timeout = self.timeout_class.duration();
        let client = self.client.clone();
        let stream = retry_transient(|| {
            let client = client.clone();
            let req = req.clone();
            async move {
                tokio::time::timeout(timeout, client.chat().create_stream(req))
                    .await
                    .map_err(|_| EngineError::ProviderTransient("request timed out".to_string()))?
                    .map_err(classify_openai_error)
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
                        yield Err(classify_openai_error(e));
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

#[async_trait]
impl EmbedProvider for OpenAiCompatibleProvider {
    fn provider_id(&self) -> &'static str {
        self.provider_id
    }

    async fn embed(&self, texts: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, EngineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.client.clone();
        let model_id = model_id.to_string();
        let texts = texts.to_vec();
        retry_transient(|| {
            let client = client.clone();
            let model_id = model_id.clone();
            let texts = texts.clone();
            async move {
                let req = CreateEmbeddingRequestArgs::default()
                    .model(model_id)
                    .input(EmbeddingInput::StringArray(texts))
                    .build()
                    .map_err(|e| EngineError::Internal(e.to_string()))?;
                let resp = client
                    .embeddings()
                    .create(req)
                    .await
                    .map_err(classify_openai_error)?;
                Ok(resp
                    .data
                    .into_iter()
                    .map(|d| d.embedding.into_iter().collect())
                    .collect())
            }
        })
        .await
    }
}

fn classify_openai_error(err: async_openai::error::OpenAIError) -> EngineError {
    use async_openai::error::OpenAIError;
    match &err {
        OpenAIError::ApiError(api_err) => {
            let message = api_err.message.clone();
            let lower = message.to_lowercase();
            if lower.contains("invalid api key")
                || lower.contains("unauthorized")
                || lower.contains("incorrect api key")
            {
                EngineError::ProviderAuth(message)
            } else if lower.contains("rate limit") || lower.contains("overloaded") {
                EngineError::ProviderTransient(message)
            } else {
                EngineError::from_provider_message(message)
            }
        }
        OpenAIError::Reqwest(_) | OpenAIError::StreamError(_) => {
            EngineError::ProviderTransient(err.to_string())
        }
        other => EngineError::from_provider_message(other.to_string()),
    }
}
