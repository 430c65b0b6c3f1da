//! Model config and language config endpoints (SPEC_FULL.md §6), grounded
//! on `examples/original_source/backend/api/v1/config.py`'s
//! `get_model_config`/`get_lang_config` handlers.

use std::collections::HashMap;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::api_state::ApiState;

/// Friendly display names for the known provider families, matching the
/// original's `provider_names` lookup table; unknown ids fall back to
/// their raw id.
fn provider_display_name(id: &str) -> String {
    match id {
        "openai" => "OpenAI".to_string(),
        "azure" => "Azure AI".to_string(),
        "openrouter" => "OpenRouter".to_string(),
        "bedrock" => "Bedrock".to_string(),
        "dashscope" => "DashScope".to_string(),
        "private_model" => "Private Model".to_string(),
        "ollama" => "Ollama".to_string(),
        "google" => "Google".to_string(),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct ModelDto {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct ProviderDto {
    id: String,
    name: String,
    models: Vec<ModelDto>,
    #[serde(rename = "defaultModel")]
    default_model: String,
}

#[derive(Serialize)]
struct ModelConfigResponse {
    providers: Vec<ProviderDto>,
    #[serde(rename = "defaultProvider")]
    default_provider: String,
}

/// `GET /models/config`: every provider known to the static
/// `generator.json`, each with its model list and default model, plus
/// the top-level default provider.
pub async fn get_model_config(State(state): State<ApiState>) -> impl IntoResponse {
    let mut providers: Vec<ProviderDto> = state
        .generator_config
        .providers
        .iter()
        .map(|(id, cfg)| ProviderDto {
            id: id.clone(),
            name: provider_display_name(id),
            models: cfg
                .models
                .iter()
                .map(|m| ModelDto {
                    id: m.id.clone(),
                    name: m.name.clone().unwrap_or_else(|| m.id.clone()),
                })
                .collect(),
            default_model: cfg.default_model.clone(),
        })
        .collect();
    providers.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ModelConfigResponse {
        providers,
        default_provider: state.generator_config.default_provider.clone(),
    })
}

#[derive(Serialize)]
struct LanguageConfigResponse {
    supported_languages: HashMap<String, String>,
    default: String,
}

/// `GET /lang/config`: the fixed set of response languages the system
/// prompt's language clause (`modes::system_prompt`) accepts, matching
/// the original's hardcoded `("en", "ja", "zh", "es", "kr", "vi")` family.
pub async fn get_lang_config() -> impl IntoResponse {
    let supported_languages = HashMap::from([
        ("en".to_string(), "English".to_string()),
        ("ja".to_string(), "Japanese".to_string()),
        ("zh".to_string(), "Chinese".to_string()),
        ("es".to_string(), "Spanish".to_string()),
        ("kr".to_string(), "Korean".to_string()),
        ("vi".to_string(), "Vietnamese".to_string()),
    ]);

    Json(LanguageConfigResponse {
        supported_languages,
        default: "en".to_string(),
    })
}
