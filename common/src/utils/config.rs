use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::default()
}

/// Process-wide runtime configuration: where persisted state lives, which
/// port the server binds, and where the static provider/model/filter
/// configuration files are loaded from.
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    /// Directory containing `generator.json`, `embedder.json`, `repo.json`.
    /// Defaults to `./config` relative to the working directory.
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            storage: default_storage_kind(),
            config_dir: default_config_dir(),
            log_level: default_log_level(),
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_config_dir() -> String {
    "./config".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

/// Substitutes `${ENV_VAR}` placeholders in raw JSON text with values from
/// the process environment. A placeholder whose variable is unset is left
/// verbatim and logged at `warn`, matching the static config files' "missing
/// vars leave the literal placeholder" requirement.
pub fn substitute_env_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let var_name = &after[..end];
        match std::env::var(var_name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                tracing::warn!(
                    var = var_name,
                    "environment variable referenced in static config not set"
                );
                out.push_str(&rest[start..start + 3 + end]);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Loads and env-substitutes a static JSON configuration file from
/// `config_dir/name`, deserializing into `T`.
pub fn load_static_json<T: for<'de> Deserialize<'de>>(
    config_dir: &str,
    name: &str,
) -> Result<T, ConfigError> {
    let path = Path::new(config_dir).join(name);
    let raw = std::fs::read_to_string(&path).map_err(|e| {
        ConfigError::Message(format!("failed to read {}: {e}", path.display()))
    })?;
    let substituted = substitute_env_vars(&raw);
    serde_json::from_str(&substituted)
        .map_err(|e| ConfigError::Message(format!("failed to parse {}: {e}", path.display())))
}

/// Sampling parameters sent to a generator model, mergeable from static
/// config, per-request overrides, and host defaults (see `resolver`).
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: ModelParams,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProviderModelsConfig {
    pub models: Vec<ModelConfig>,
    pub default_model: String,
}

/// `generator.json`: one entry per known provider family plus a top-level
/// default provider id.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GeneratorConfig {
    pub default_provider: String,
    pub providers: HashMap<String, ProviderModelsConfig>,
}

/// `embedder.json`: embedding provider/model selection plus chunking and
/// retrieval tuning.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EmbedderConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: Option<u32>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_top_k() -> usize {
    20
}

fn default_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    200
}

/// `repo.json`: default file-filter lists applied when a request doesn't
/// override them.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct RepoFilterDefaults {
    #[serde(default)]
    pub excluded_dirs: Vec<String>,
    #[serde(default)]
    pub excluded_files: Vec<String>,
    #[serde(default)]
    pub included_dirs: Vec<String>,
    #[serde(default)]
    pub included_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_env_var() {
        std::env::set_var("COMMON_CONFIG_TEST_VAR", "shh");
        let out = substitute_env_vars("key=${COMMON_CONFIG_TEST_VAR}!");
        assert_eq!(out, "key=shh!");
    }

    #[test]
    fn leaves_unknown_placeholder_verbatim() {
        std::env::remove_var("COMMON_CONFIG_TEST_MISSING");
        let out = substitute_env_vars("key=${COMMON_CONFIG_TEST_MISSING}");
        assert_eq!(out, "key=${COMMON_CONFIG_TEST_MISSING}");
    }
}
