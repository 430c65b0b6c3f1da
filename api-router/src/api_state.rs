use std::sync::Arc;

use common::utils::config::{AppConfig, GeneratorConfig, RepoFilterDefaults};
use providers::ProviderRegistry;
use retrieval_pipeline::QueryPipeline;

/// Handles the `main` binary constructs once at startup and shares across
/// every request: the resolved static configuration plus the long-lived
/// engine handles (C9 Query Pipeline, C10 Provider Registry).
#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub query_pipeline: Arc<QueryPipeline>,
    pub registry: Arc<ProviderRegistry>,
    pub generator_config: Arc<GeneratorConfig>,
    pub repo_defaults: Arc<RepoFilterDefaults>,
}

impl ApiState {
    pub fn new(
        config: AppConfig,
        query_pipeline: Arc<QueryPipeline>,
        registry: Arc<ProviderRegistry>,
        generator_config: GeneratorConfig,
        repo_defaults: RepoFilterDefaults,
    ) -> Self {
        Self {
            config,
            query_pipeline,
            registry,
            generator_config: Arc::new(generator_config),
            repo_defaults: Arc::new(repo_defaults),
        }
    }
}
