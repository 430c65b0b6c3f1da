//! C6 Vector Store and C7 Similarity Index (SPEC_FULL.md §4.6).
//!
//! Persistence of a [`RepositoryIndex`] and the dominant-dimension
//! reconciliation algorithm, grounded on
//! `examples/original_source/backend/data/vector_store.py`'s
//! `validate_embeddings` method.

use std::collections::HashMap;

use tracing::warn;

use crate::error::EngineError;
use crate::model::chunk::Chunk;
use crate::model::repository::RepositoryIndex;
use crate::storage::store::StorageManager;

/// Location of a repository's serialized index under the storage root.
pub fn index_location(repo_id: &str) -> String {
    format!("databases/{repo_id}.json")
}

/// Location of a repository's cloned tree under the storage root (the
/// `StorageManager`'s local backend resolves this to a real filesystem
/// path via `resolve_local_path`).
pub fn repo_tree_location(repo_id: &str) -> String {
    format!("repos/{repo_id}")
}

/// Computes the dominant dimension among a set of chunks' vectors: the
/// dimension occurring most frequently, ties broken toward the smaller
/// dimension for determinism. Returns `None` if no chunk carries a vector.
fn dominant_dimension(chunks: &[Chunk]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for chunk in chunks {
        if let Some(dim) = chunk.dimension() {
            if dim > 0 {
                *counts.entry(dim).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by(|(dim_a, count_a), (dim_b, count_b)| {
            count_a.cmp(count_b).then(dim_b.cmp(dim_a))
        })
        .map(|(dim, _)| dim)
}

/// Drops every chunk whose vector dimension differs from the dominant
/// dimension among `chunks` (with a per-file warning identifying the
/// offending `source_path`), shared by the fresh-ingest path
/// ([`reconcile`]) and the load path ([`load`]) per §4.6. Returns the
/// retained chunks and the dominant dimension (`None` if no chunk
/// carries a vector at all).
fn filter_to_dominant_dimension(repo_id: &str, chunks: Vec<Chunk>) -> (Vec<Chunk>, Option<usize>) {
    let Some(dominant) = dominant_dimension(&chunks) else {
        return (Vec::new(), None);
    };

    let mut validated = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match chunk.dimension() {
            Some(dim) if dim == dominant => validated.push(chunk),
            Some(dim) => {
                warn!(
                    repo_id,
                    source_path = %chunk.source_path,
                    found_dimension = dim,
                    dominant_dimension = dominant,
                    "dropping chunk embedded at a minority dimension"
                );
            }
            None => {
                warn!(
                    repo_id,
                    source_path = %chunk.source_path,
                    "dropping chunk with no embedding"
                );
            }
        }
    }

    (validated, Some(dominant))
}

/// Reconciles a freshly chunked-and-embedded set of chunks into a valid
/// [`RepositoryIndex`]: drops chunks whose vector dimension differs from
/// the dominant dimension (with a per-file warning), and fails ingestion
/// if zero valid embeddings remain (invariant #1, §8).
pub fn reconcile(repo_id: &str, chunks: Vec<Chunk>) -> Result<RepositoryIndex, EngineError> {
    let (validated, dominant) = filter_to_dominant_dimension(repo_id, chunks);
    let Some(dominant) = dominant else {
        return Err(EngineError::Ingestion(format!(
            "no valid embeddings produced for repository '{repo_id}'"
        )));
    };

    if validated.is_empty() {
        return Err(EngineError::Ingestion(format!(
            "no valid embeddings remained after dimension reconciliation for repository '{repo_id}'"
        )));
    }

    Ok(RepositoryIndex {
        repo_id: repo_id.to_string(),
        chunks: validated,
        vector_dimension: dominant,
        build_timestamp: chrono::Utc::now(),
    })
}

/// Persists a [`RepositoryIndex`] as a single JSON object under
/// `databases/<repo_id>.json`.
pub async fn save(
    storage: &StorageManager,
    index: &RepositoryIndex,
) -> Result<(), EngineError> {
    let bytes = serde_json::to_vec(index)?;
    storage
        .put(&index_location(&index.repo_id), bytes.into())
        .await?;
    Ok(())
}

/// Loads a previously persisted [`RepositoryIndex`], returning `None` when
/// none exists yet for this `repo_id`. Re-runs dominant-dimension
/// reconciliation on the loaded chunks (§4.6, invariant #1): a persisted
/// index can drift to mixed dimensions across re-embeds with a different
/// model, so minority-dimension chunks are dropped with a per-file
/// warning here too, not just on the fresh-ingest path. Unlike
/// [`reconcile`], this never fails the load outright; an index reconciled
/// down to zero chunks is simply returned empty, which
/// [`RepositoryIndex::is_usable`] treats as not reusable.
pub async fn load(
    storage: &StorageManager,
    repo_id: &str,
) -> Result<Option<RepositoryIndex>, EngineError> {
    let location = index_location(repo_id);
    if !storage.exists(&location).await? {
        return Ok(None);
    }
    let bytes = storage.get(&location).await?;
    let index: RepositoryIndex = serde_json::from_slice(&bytes)?;
    let (chunks, dominant) = filter_to_dominant_dimension(repo_id, index.chunks);
    let vector_dimension = dominant.unwrap_or(index.vector_dimension);
    Ok(Some(RepositoryIndex {
        repo_id: index.repo_id,
        chunks,
        vector_dimension,
        build_timestamp: index.build_timestamp,
    }))
}

/// Exact cosine-similarity k-NN over an already dimension-reconciled
/// vector set (C7). Brute-force scan, deterministic tie-breaking by
/// ascending chunk index (§4.6).
pub struct SimilarityIndex<'a> {
    chunks: &'a [Chunk],
}

impl<'a> SimilarityIndex<'a> {
    pub fn build(chunks: &'a [Chunk]) -> Self {
        Self { chunks }
    }

    /// Returns up to `top_k` `(chunk_index, score)` pairs, descending by
    /// score, ties broken by the lower chunk index (invariant #4, §8).
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(idx, chunk)| {
                chunk
                    .vector
                    .as_ref()
                    .map(|v| (idx, cosine_similarity(query_vector, v)))
            })
            .collect();

        scored.sort_by(|(idx_a, score_a), (idx_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(idx_a.cmp(idx_b))
        });

        scored.truncate(top_k);
        scored
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with_vector(path: &str, ordinal: usize, vector: Option<Vec<f32>>) -> Chunk {
        Chunk {
            chunk_id: format!("{path}-{ordinal}"),
            owner_repo_id: "repo".to_string(),
            source_path: path.to_string(),
            text: "text".to_string(),
            token_count: 10,
            ordinal_within_file: ordinal,
            vector,
        }
    }

    #[test]
    fn reconcile_drops_minority_dimension_vectors() {
        let chunks = vec![
            chunk_with_vector("a.rs", 0, Some(vec![0.1; 384])),
            chunk_with_vector("b.rs", 0, Some(vec![0.1; 384])),
            chunk_with_vector("c.rs", 0, Some(vec![0.1; 384])),
            chunk_with_vector("d.rs", 0, Some(vec![0.1; 384])),
            chunk_with_vector("bad.rs", 0, Some(vec![0.1; 512])),
        ];
        let index = reconcile("repo", chunks).expect("reconcile succeeds");
        assert_eq!(index.vector_dimension, 384);
        assert_eq!(index.chunks.len(), 4);
        assert!(index.chunks.iter().all(|c| c.source_path != "bad.rs"));
    }

    #[test]
    fn reconcile_fails_with_zero_valid_embeddings() {
        let chunks = vec![chunk_with_vector("a.rs", 0, None)];
        let err = reconcile("repo", chunks).unwrap_err();
        assert!(matches!(err, EngineError::Ingestion(_)));
    }

    #[tokio::test]
    async fn load_drops_minority_dimension_vectors_from_a_persisted_index() {
        let test_storage = crate::storage::store::testing::TestStorageManager::new_memory()
            .await
            .expect("memory storage");
        let storage = test_storage.storage();

        let mut chunks = Vec::new();
        for i in 0..4 {
            chunks.push(chunk_with_vector(&format!("a{i}.rs"), 0, Some(vec![0.1; 384])));
        }
        chunks.push(chunk_with_vector("stale.rs", 0, Some(vec![0.1; 512])));

        let persisted = RepositoryIndex {
            repo_id: "repo".to_string(),
            chunks,
            vector_dimension: 512,
            build_timestamp: chrono::Utc::now(),
        };
        save(storage, &persisted).await.expect("save succeeds");

        let loaded = load(storage, "repo")
            .await
            .expect("load succeeds")
            .expect("index exists");
        assert_eq!(loaded.vector_dimension, 384);
        assert_eq!(loaded.chunks.len(), 4);
        assert!(loaded.chunks.iter().all(|c| c.source_path != "stale.rs"));
    }

    #[test]
    fn similarity_search_orders_by_score_then_index() {
        let chunks = vec![
            chunk_with_vector("a.rs", 0, Some(vec![1.0, 0.0])),
            chunk_with_vector("b.rs", 0, Some(vec![1.0, 0.0])),
            chunk_with_vector("c.rs", 0, Some(vec![0.0, 1.0])),
        ];
        let index = SimilarityIndex::build(&chunks);
        let results = index.search(&[1.0, 0.0], 3);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
        assert_eq!(results[2].0, 2);
        assert!(results[0].1 > results[2].1);
    }
}
