//! C14 Configuration Resolver (SPEC_FULL.md §4.14): merges the static
//! `generator.json` with a request's `provider_id`/`model_id` overrides
//! into a single [`ProviderBinding`], grounded on the teacher's
//! `pipeline::config::RetrievalConfig` pattern of layering a static
//! default over per-call overrides, generalized from retrieval tuning
//! knobs to provider/model selection.

use common::error::EngineError;
use common::model::provider::ProviderBinding;
use common::utils::config::GeneratorConfig;
use providers::ProviderRegistry;

/// Resolves the provider/model binding for one query, failing fast
/// (§4.14 "Non-goals don't include silent substitution") rather than
/// falling back to a different provider or model than what was asked for.
pub fn resolve(
    generator_config: &GeneratorConfig,
    registry: &ProviderRegistry,
    request_provider_id: Option<&str>,
    request_model_id: Option<&str>,
) -> Result<ProviderBinding, EngineError> {
    let provider_id = request_provider_id
        .map(str::to_string)
        .unwrap_or_else(|| generator_config.default_provider.clone());

    let provider_config = generator_config
        .providers
        .get(&provider_id)
        .ok_or_else(|| EngineError::Validation(format!("unknown provider '{provider_id}'")))?;

    // A provider listed in the static config but missing its credentials
    // in the environment never made it into the registry; surface the
    // same "unknown provider" error either way rather than distinguishing
    // "not configured" from "not credentialed" to the caller.
    registry.generator(&provider_id)?;

    let model_id = request_model_id
        .map(str::to_string)
        .unwrap_or_else(|| provider_config.default_model.clone());

    let model_config = provider_config
        .models
        .iter()
        .find(|m| m.id == model_id)
        .ok_or_else(|| {
            EngineError::Validation(format!("unknown model '{model_id}' for provider '{provider_id}'"))
        })?;

    Ok(ProviderBinding {
        provider_id,
        model_id,
        params: model_config.params.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::utils::config::{ModelConfig, ModelParams, ProviderModelsConfig};
    use std::collections::HashMap;

    fn generator_config() -> GeneratorConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderModelsConfig {
                models: vec![ModelConfig {
                    id: "gpt-4o".to_string(),
                    name: Some("GPT-4o".to_string()),
                    params: ModelParams {
                        temperature: Some(0.2),
                        top_p: None,
                        max_tokens: Some(4096),
                    },
                }],
                default_model: "gpt-4o".to_string(),
            },
        );
        GeneratorConfig {
            default_provider: "openai".to_string(),
            providers,
        }
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = resolve(&generator_config(), &ProviderRegistry::from_env(), Some("nope"), None).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn rejects_unknown_model_for_known_provider() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let err = resolve(
            &generator_config(),
            &ProviderRegistry::from_env(),
            Some("openai"),
            Some("not-a-model"),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn falls_back_to_defaults_when_request_is_silent() {
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let binding = resolve(&generator_config(), &ProviderRegistry::from_env(), None, None).unwrap();
        assert_eq!(binding.provider_id, "openai");
        assert_eq!(binding.model_id, "gpt-4o");
        assert_eq!(binding.params.max_tokens, Some(4096));
    }
}
