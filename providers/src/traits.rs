use std::pin::Pin;

use async_trait::async_trait;
use common::error::EngineError;
use common::utils::config::ModelParams;
use futures::Stream;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub params: ModelParams,
}

/// A lazy, finite sequence of text fragments with explicit end-of-stream
/// (SPEC_FULL.md §9 "Streaming representation"). Cancellable by dropping
/// the stream or signalling the [`CancellationToken`] passed to `acall`.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, EngineError>> + Send>>;

/// Unified generation contract every provider family implements (C10,
/// §4.9). `convert_inputs`/`call`/`parse_chat` are folded into `acall`
/// for each concrete provider — the seam is the trait boundary itself,
/// not an intermediate request/response struct, since each provider's
/// native wire shape differs enough that forcing a shared intermediate
/// representation would just be reinvented per provider anyway.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider family identifier, e.g. `"openai"`, `"bedrock"`.
    fn provider_id(&self) -> &'static str;

    /// Streams text chunks in arrival order. Non-streaming providers MUST
    /// wrap their single response as one final chunk (§4.9).
    async fn acall(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<TextStream, EngineError>;
}

/// Unified embedding contract (C5).
#[async_trait]
pub trait EmbedProvider: Send + Sync {
    fn provider_id(&self) -> &'static str;

    /// Embeds a homogeneous batch, order-preserving. All returned vectors
    /// within one call share a single dimension.
    async fn embed(&self, texts: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, EngineError>;

    /// Embeds a single query string.
    async fn embed_query(&self, text: &str, model_id: &str) -> Result<Vec<f32>, EngineError> {
        let mut v = self.embed(std::slice::from_ref(&text.to_string()), model_id).await?;
        v.pop()
            .ok_or_else(|| EngineError::Internal("embedder returned no vector".to_string()))
    }

    /// Local/in-process providers MUST check model availability before
    /// first use and return an actionable error naming the install
    /// command when the model is missing (§4.5).
    async fn ensure_model_available(&self, _model_id: &str) -> Result<(), EngineError> {
        Ok(())
    }
}
