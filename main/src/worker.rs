//! Standalone ingestion CLI: pre-warms one or more repository indexes
//! without waiting for a query to trigger C8 (SPEC_FULL.md §4.7). The
//! teacher runs a long-lived polling worker against a task queue; this
//! crate's Query Pipeline ingests synchronously on first use (C9's
//! Prepare stage), so there is no queue left to poll. What survives from
//! the teacher's worker binary is the standalone-process shape itself:
//! a second entry point, sharing `common`/`providers`/`ingestion-pipeline`
//! with the server, for operators who want ingestion to happen ahead of
//! the first request (a cron job, a deploy hook) rather than on it.

use std::sync::Arc;

use clap::Parser;
use common::model::repository::{FilterSet, HostKind, RepositoryDescriptor};
use common::utils::config::AppConfig;
use ingestion_pipeline::IngestionPipeline;
use providers::ProviderRegistry;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ingests the given repositories and exits, so their indexes are warm
/// before the first query arrives.
#[derive(Parser, Debug)]
#[command(name = "worker", about = "Pre-ingest repositories into the vector store")]
struct Args {
    /// Repository locator: a clone URL (github/gitlab/bitbucket) or a
    /// local filesystem path. May be repeated.
    #[arg(required = true)]
    repos: Vec<String>,

    /// Host kind shared by every locator passed on this invocation.
    #[arg(long, value_enum, default_value = "github")]
    host: HostArg,

    /// Credential (personal access token) used for every locator, if the
    /// host requires one (§4.1).
    #[arg(long, env = "WORKER_REPO_TOKEN")]
    token: Option<String>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum HostArg {
    Github,
    Gitlab,
    Bitbucket,
    Local,
}

impl From<HostArg> for HostKind {
    fn from(value: HostArg) -> Self {
        match value {
            HostArg::Github => HostKind::Github,
            HostArg::Gitlab => HostKind::Gitlab,
            HostArg::Bitbucket => HostKind::Bitbucket,
            HostArg::Local => HostKind::Local,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config: AppConfig = common::utils::config::get_config()?;
    let embedder_config: common::utils::config::EmbedderConfig =
        common::utils::config::load_static_json(&config.config_dir, "embedder.json")?;

    let storage = common::storage::store::StorageManager::new(&config).await?;
    let registry = Arc::new(ProviderRegistry::from_env());
    let embedder = registry.embedder(&embedder_config.provider)?;
    let pipeline = IngestionPipeline::new(storage, embedder, embedder_config);

    let host_kind: HostKind = args.host.into();
    let mut failures = 0usize;
    for locator in &args.repos {
        let descriptor = RepositoryDescriptor {
            host_kind,
            locator: locator.clone(),
            credential: args.token.clone(),
            filters: FilterSet::default(),
        };
        match pipeline.ingest(&descriptor).await {
            Ok(index) => info!(
                repo_id = %descriptor.repo_id(),
                chunk_count = index.chunks.len(),
                "ingestion complete"
            ),
            Err(e) => {
                failures += 1;
                error!(repo_id = %descriptor.repo_id(), error = %e, "ingestion failed");
            }
        }
    }

    if failures > 0 {
        Err(format!("{failures} repositories failed to ingest").into())
    } else {
        Ok(())
    }
}
