use serde::{Deserialize, Serialize};

use crate::utils::config::ModelParams;

/// The fully specified `{provider_id, model_id, sampling params}` binding
/// the Configuration Resolver (C14) produces before the Query Pipeline
/// begins generation (§4.14).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderBinding {
    pub provider_id: String,
    pub model_id: String,
    pub params: ModelParams,
}
