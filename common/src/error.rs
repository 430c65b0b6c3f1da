use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// Unified error taxonomy for the engine (SPEC_FULL.md §7).
///
/// Construction of [`EngineError::Acquisition`] and [`EngineError::ProviderAuth`]
/// MUST scrub credential material before the variant is built — never by
/// relying on `Display` to redact later.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("repository acquisition failed: {0}")]
    Acquisition(String),

    #[error("ingestion failed: {0}")]
    Ingestion(String),

    #[error("provider request failed (transient): {0}")]
    ProviderTransient(String),

    #[error("provider request failed: {0}")]
    Provider(String),

    #[error("provider authentication failed: {0}")]
    ProviderAuth(String),

    #[error("provider context length exceeded: {0}")]
    TokenLimitExceeded(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("OpenAI-compatible provider error: {0}")]
    OpenAI(#[from] OpenAIError),

    #[error("task join error: {0}")]
    Join(#[from] JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True when this error should trigger the context-free fallback
    /// (SPEC_FULL.md §4.11): the simplified retry, not user-facing failure.
    pub fn is_token_limit(&self) -> bool {
        matches!(self, EngineError::TokenLimitExceeded(_))
    }

    /// Classifies a raw provider error message into a [`EngineError`]
    /// variant by matching the token-limit phrase family, independent of
    /// which concrete provider produced it. Anything outside that family
    /// is neither transient nor token-limit, so it is classified as
    /// [`EngineError::Provider`] — not retried, not silently swallowed
    /// (§4.9 "Other errors fail fast").
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        const TOKEN_LIMIT_PATTERNS: [&str; 3] = [
            "maximum context length",
            "token limit",
            "too many tokens",
        ];
        if TOKEN_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
            EngineError::TokenLimitExceeded(message)
        } else {
            EngineError::Provider(message)
        }
    }
}
