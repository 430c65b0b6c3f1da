//! Binds the eight known provider families (§4.9) to live clients built
//! from environment-variable credentials (§6 "Environment variables"),
//! and exposes lookup by `provider_id` for the Configuration Resolver
//! (C14) and Query Pipeline (C9).

use std::collections::HashMap;
use std::sync::Arc;

use common::error::EngineError;

use crate::azure::AzureProvider;
use crate::bedrock::{AwsCredentials, BedrockProvider};
use crate::embed_local::LocalEmbedProvider;
use crate::google::GoogleProvider;
use crate::openai_compatible::OpenAiCompatibleProvider;
use crate::traits::{EmbedProvider, LlmProvider};

/// Recognized provider family identifiers (§4.9's unified-contract table).
pub const KNOWN_PROVIDERS: &[&str] = &[
    "openai",
    "azure",
    "openrouter",
    "bedrock",
    "dashscope",
    "private_model",
    "ollama",
    "google",
];

pub struct ProviderRegistry {
    generators: HashMap<String, Arc<dyn LlmProvider>>,
    embedders: HashMap<String, Arc<dyn EmbedProvider>>,
}

impl ProviderRegistry {
    pub fn generator(&self, provider_id: &str) -> Result<Arc<dyn LlmProvider>, EngineError> {
        self.generators
            .get(provider_id)
            .cloned()
            .ok_or_else(|| EngineError::Validation(format!("unknown provider '{provider_id}'")))
    }

    pub fn embedder(&self, provider_id: &str) -> Result<Arc<dyn EmbedProvider>, EngineError> {
        self.embedders
            .get(provider_id)
            .cloned()
            .ok_or_else(|| EngineError::Validation(format!("unknown embedding provider '{provider_id}'")))
    }

    pub fn known_provider_ids(&self) -> Vec<String> {
        self.generators.keys().cloned().collect()
    }

    /// Builds every provider whose required environment variables are
    /// present; providers with missing credentials are simply absent from
    /// the registry so lookup fails with `ValidationError` (§7) at first
    /// use rather than at startup (§6 "Missing credentials produce a
    /// user-actionable error at first call, not at startup" — the
    /// resolver surfaces this as `unknown provider` since an uncredentialed
    /// provider is unusable either way).
    pub fn from_env() -> Self {
        let mut generators: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        let mut embedders: HashMap<String, Arc<dyn EmbedProvider>> = HashMap::new();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            let provider = Arc::new(OpenAiCompatibleProvider::openai(key));
            generators.insert("openai".to_string(), provider.clone());
            embedders.insert("openai".to_string(), provider);
        }

        if let (Ok(key), Ok(base), Ok(version)) = (
            std::env::var("AZURE_OPENAI_API_KEY"),
            std::env::var("AZURE_OPENAI_API_BASE"),
            std::env::var("AZURE_OPENAI_API_VERSION"),
        ) {
            let deployment =
                std::env::var("AZURE_OPENAI_DEPLOYMENT_ID").unwrap_or_else(|_| "default".to_string());
            generators.insert(
                "azure".to_string(),
                Arc::new(AzureProvider::new(key, base, version, deployment)),
            );
        }

        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            generators.insert(
                "openrouter".to_string(),
                Arc::new(OpenAiCompatibleProvider::openrouter(key)),
            );
        }

        if let Ok(key) = std::env::var("DASHSCOPE_API_KEY") {
            let provider = Arc::new(OpenAiCompatibleProvider::dashscope(key));
            generators.insert("dashscope".to_string(), provider.clone());
            embedders.insert("dashscope".to_string(), provider);
        }

        if let Ok(base) = std::env::var("PRIVATE_MODEL_API_BASE") {
            let key = std::env::var("PRIVATE_MODEL_API_KEY").ok();
            generators.insert(
                "private_model".to_string(),
                Arc::new(OpenAiCompatibleProvider::private_model(key, base)),
            );
        }

        {
            let base =
                std::env::var("OLLAMA_API_BASE").unwrap_or_else(|_| "http://localhost:11434/v1".to_string());
            let provider = Arc::new(OpenAiCompatibleProvider::ollama(base));
            generators.insert("ollama".to_string(), provider.clone());
            embedders.insert("ollama".to_string(), provider);
        }

        if let (Ok(access_key), Ok(secret_key)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
            generators.insert(
                "bedrock".to_string(),
                Arc::new(BedrockProvider::new(AwsCredentials {
                    access_key_id: access_key,
                    secret_access_key: secret_key,
                    session_token,
                    region,
                })),
            );
        }

        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            generators.insert("google".to_string(), Arc::new(GoogleProvider::new(key)));
        }

        let local_model_id =
            std::env::var("LOCAL_EMBEDDING_MODEL").unwrap_or_else(|_| "BAAI/bge-small-en-v1.5".to_string());
        embedders.insert(
            "local".to_string(),
            Arc::new(LocalEmbedProvider::new(&local_model_id)),
        );

        Self {
            generators,
            embedders,
        }
    }
}
