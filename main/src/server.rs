//! The HTTP entry point: boots the ambient stack (tracing, static
//! configuration, storage, providers) and serves the §6 external
//! interfaces over axum. Grounded on the teacher's `main/src/server.rs`
//! bootstrap shape (tracing init, config load, resource construction,
//! `axum::serve` loop); swapped from the teacher's SurrealDB-backed HTML
//! app state to this crate's `ApiState` (C9 Query Pipeline + C10 Provider
//! Registry).

use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::utils::config::{AppConfig, EmbedderConfig, GeneratorConfig, RepoFilterDefaults};
use ingestion_pipeline::IngestionPipeline;
use providers::ProviderRegistry;
use retrieval_pipeline::QueryPipeline;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Loads `generator.json`, falling back to a single built-in
/// `ollama`/`llama3` binding when the static config directory carries
/// none (development convenience; `ollama` is the only provider family
/// the registry registers without any credentials, so this is the one
/// fallback that works out of the box. Production deployments ship
/// their own `config/generator.json` per §6).
fn load_generator_config(config_dir: &str) -> GeneratorConfig {
    common::utils::config::load_static_json(config_dir, "generator.json").unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to built-in generator config");
        let mut providers = std::collections::HashMap::new();
        providers.insert(
            "ollama".to_string(),
            common::utils::config::ProviderModelsConfig {
                models: vec![common::utils::config::ModelConfig {
                    id: "llama3".to_string(),
                    name: Some("Llama 3".to_string()),
                    params: common::utils::config::ModelParams::default(),
                }],
                default_model: "llama3".to_string(),
            },
        );
        GeneratorConfig {
            default_provider: "ollama".to_string(),
            providers,
        }
    })
}

fn load_embedder_config(config_dir: &str) -> EmbedderConfig {
    common::utils::config::load_static_json(config_dir, "embedder.json").unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to built-in embedder config");
        EmbedderConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: Some(768),
            top_k: 20,
            chunk_size: 1500,
            chunk_overlap: 200,
        }
    })
}

fn load_repo_defaults(config_dir: &str) -> RepoFilterDefaults {
    common::utils::config::load_static_json(config_dir, "repo.json").unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to empty repo filter defaults");
        RepoFilterDefaults::default()
    })
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config: AppConfig = common::utils::config::get_config()?;

    let generator_config = load_generator_config(&config.config_dir);
    let embedder_config = load_embedder_config(&config.config_dir);
    let repo_defaults = load_repo_defaults(&config.config_dir);

    // Create global storage manager and provider registry (C14, C10)
    let storage = common::storage::store::StorageManager::new(&config).await?;
    let registry = Arc::new(ProviderRegistry::from_env());
    let embedder = registry.embedder(&embedder_config.provider)?;

    let ingestion = Arc::new(IngestionPipeline::new(
        storage,
        embedder,
        embedder_config.clone(),
    ));

    let query_pipeline = Arc::new(QueryPipeline::new(
        ingestion,
        registry.clone(),
        generator_config.clone(),
        embedder_config,
    ));

    let api_state = ApiState::new(
        config.clone(),
        query_pipeline,
        registry,
        generator_config,
        repo_defaults,
    );

    // Create Axum router
    let app: Router = Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use common::utils::config::StorageKind;
    use tower::ServiceExt;

    async fn build_test_app() -> Router {
        let config = AppConfig {
            storage: StorageKind::Memory,
            ..Default::default()
        };
        let generator_config = load_generator_config("/nonexistent");
        let embedder_config = load_embedder_config("/nonexistent");
        let repo_defaults = load_repo_defaults("/nonexistent");

        let storage = common::storage::store::StorageManager::new(&config).await.unwrap();
        let registry = Arc::new(ProviderRegistry::from_env());
        let embedder = registry.embedder(&embedder_config.provider).unwrap();
        let ingestion = Arc::new(IngestionPipeline::new(storage, embedder, embedder_config.clone()));
        let query_pipeline = Arc::new(QueryPipeline::new(
            ingestion,
            registry.clone(),
            generator_config.clone(),
            embedder_config,
        ));
        let api_state = ApiState::new(config, query_pipeline, registry, generator_config, repo_defaults);

        Router::new()
            .nest("/api/v1", api_routes_v1())
            .with_state(api_state)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn live_and_ready_respond_ok_with_no_credentials() {
        let app = build_test_app().await;

        let live = app
            .clone()
            .oneshot(Request::builder().uri("/api/v1/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(live.status(), StatusCode::OK);

        let ready = app
            .oneshot(Request::builder().uri("/api/v1/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // `ollama` is registered unconditionally (no credential required),
        // so readiness is satisfied even without any provider API keys set.
        assert_eq!(ready.status(), StatusCode::OK);
    }
}
