//! C8 Ingestion Pipeline (SPEC_FULL.md §4.7): orchestrates C1 acquire →
//! C2 walk → C3 chunk → C5 embed → C6 reconcile/persist, reusing a
//! persisted index when one already exists for `repo_id`. Grounded on the
//! teacher's original `IngestionPipeline::process` shape (sequential
//! stage calls feeding a single persisted artifact) generalized from a
//! knowledge-graph store to the reconciled vector index.

use std::sync::Arc;

use common::error::EngineError;
use common::model::chunk::Chunk;
use common::model::repository::{RepositoryDescriptor, RepositoryIndex};
use common::storage::store::StorageManager;
use common::storage::vector_store::{self, reconcile};
use common::utils::config::EmbedderConfig;
use providers::EmbedProvider;
use tracing::{info, warn};

use crate::acquire;
use crate::chunker;
use crate::walker;

/// Batches embedding calls at this many chunks per provider round-trip so
/// a single oversized repository doesn't attempt one enormous batch call
/// (C5 requirement 1: "the caller is responsible for batching").
const EMBED_BATCH_SIZE: usize = 64;

pub struct IngestionPipeline {
    storage: StorageManager,
    embedder: Arc<dyn EmbedProvider>,
    embedder_config: EmbedderConfig,
}

impl IngestionPipeline {
    pub fn new(
        storage: StorageManager,
        embedder: Arc<dyn EmbedProvider>,
        embedder_config: EmbedderConfig,
    ) -> Self {
        Self {
            storage,
            embedder,
            embedder_config,
        }
    }

    /// Runs the steps of §4.7 in order, returning the persisted,
    /// dimension-reconciled [`RepositoryIndex`].
    pub async fn ingest(&self, descriptor: &RepositoryDescriptor) -> Result<RepositoryIndex, EngineError> {
        let repo_id = descriptor.repo_id();

        if let Some(existing) = self.load_existing(&repo_id).await? {
            if existing.is_usable() {
                info!(repo_id, "reusing existing repository index");
                return Ok(existing);
            }
        }

        let tree_path = acquire::acquire(&self.storage, descriptor).await?;

        let walker_tree_path = tree_path.clone();
        let filters = descriptor.filters.clone();
        let files = tokio::task::spawn_blocking(move || walker::walk(&walker_tree_path, &filters))
            .await
            .map_err(EngineError::Join)??;

        if files.is_empty() {
            return Err(EngineError::Ingestion(format!(
                "no files discovered for repository '{repo_id}' after filtering"
            )));
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        for file in &files {
            chunks.extend(chunker::chunk(
                &repo_id,
                file,
                self.embedder_config.chunk_size,
                self.embedder_config.chunk_overlap,
            ));
        }

        if chunks.is_empty() {
            return Err(EngineError::Ingestion(format!(
                "no chunks produced for repository '{repo_id}'"
            )));
        }

        let embedded = self.embed_all(chunks).await?;
        let index = reconcile(&repo_id, embedded)?;
        vector_store::save(&self.storage, &index).await?;
        info!(repo_id, chunk_count = index.chunks.len(), "ingestion complete");
        Ok(index)
    }

    async fn load_existing(&self, repo_id: &str) -> Result<Option<RepositoryIndex>, EngineError> {
        vector_store::load(&self.storage, repo_id).await
    }

    /// Exposes the underlying storage backend so callers outside this
    /// crate (the Query Pipeline's pinned-file lookup) can resolve a
    /// repository's acquired tree path without duplicating the backend
    /// wiring.
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Embeds chunks in fixed-size batches. A per-batch failure that looks
    /// like a content or mismatch problem only drops that batch's chunks
    /// (§4.7 "per-file embedding failures drop that file's chunks");
    /// a provider-unreachable failure aborts the whole ingestion without
    /// writing a partial index.
    async fn embed_all(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>, EngineError> {
        let mut embedded = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed(&texts, &self.embedder_config.model).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    for (chunk, vector) in batch.iter().cloned().zip(vectors) {
                        embedded.push(Chunk {
                            vector: Some(vector),
                            ..chunk
                        });
                    }
                }
                Ok(_) => {
                    warn!(
                        source_path = %batch.first().map(|c| c.source_path.as_str()).unwrap_or(""),
                        "embedding response size mismatch, dropping batch"
                    );
                }
                Err(EngineError::ProviderTransient(msg)) | Err(EngineError::ProviderAuth(msg)) => {
                    return Err(EngineError::Ingestion(format!(
                        "embedding provider unreachable, aborting ingestion: {msg}"
                    )));
                }
                Err(e) => {
                    warn!(error = %e, "embedding batch failed, dropping its chunks");
                }
            }
        }
        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::model::repository::{FilterSet, HostKind};
    use common::utils::config::StorageKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        dimension: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbedProvider for FixedEmbedder {
        fn provider_id(&self) -> &'static str {
            "fixed"
        }

        async fn embed(&self, texts: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.1_f32; self.dimension]).collect())
        }
    }

    fn embedder_config() -> EmbedderConfig {
        EmbedderConfig {
            provider: "fixed".to_string(),
            model: "fixed-model".to_string(),
            dimensions: Some(4),
            top_k: 5,
            chunk_size: 50,
            chunk_overlap: 5,
        }
    }

    #[tokio::test]
    async fn ingests_a_local_tree_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn main() { println!(\"hi\"); }\n".repeat(20)).unwrap();

        let cfg = common::utils::config::AppConfig {
            data_dir: "/tmp/unused".into(),
            storage: StorageKind::Memory,
            ..Default::default()
        };
        let storage = StorageManager::new(&cfg).await.unwrap();
        let embedder = Arc::new(FixedEmbedder {
            dimension: 4,
            calls: AtomicUsize::new(0),
        });

        let pipeline = IngestionPipeline::new(storage, embedder, embedder_config());
        let descriptor = RepositoryDescriptor {
            host_kind: HostKind::Local,
            locator: dir.path().to_string_lossy().to_string(),
            credential: None,
            filters: FilterSet::default(),
        };

        let index = pipeline.ingest(&descriptor).await.unwrap();
        assert!(index.is_usable());
        assert!(index.chunks.iter().all(|c| c.vector.is_some()));
    }

    #[tokio::test]
    async fn second_ingestion_reuses_persisted_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn main() {}\n".repeat(5)).unwrap();

        let cfg = common::utils::config::AppConfig {
            data_dir: "/tmp/unused".into(),
            storage: StorageKind::Memory,
            ..Default::default()
        };
        let storage = StorageManager::new(&cfg).await.unwrap();
        let embedder = Arc::new(FixedEmbedder {
            dimension: 4,
            calls: AtomicUsize::new(0),
        });

        let pipeline = IngestionPipeline::new(storage, embedder.clone(), embedder_config());
        let descriptor = RepositoryDescriptor {
            host_kind: HostKind::Local,
            locator: dir.path().to_string_lossy().to_string(),
            credential: None,
            filters: FilterSet::default(),
        };

        let first = pipeline.ingest(&descriptor).await.unwrap();
        let second = pipeline.ingest(&descriptor).await.unwrap();
        assert_eq!(first.chunks.len(), second.chunks.len());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }
}
