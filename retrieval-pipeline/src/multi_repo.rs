//! C13 Multi-Repository Coordinator (SPEC_FULL.md §4.12): fans a query
//! out across every repository named in the request, running C9's
//! Prepare/Retrieve/Assemble/Generate stages once per repository in
//! request order, and merges the per-repo answers into one progressively
//! streamed response (§9 Open Question (c): sub-result text only, never
//! JSON progress frames — the sentinel is appended by the transport
//! layer per §6).

use std::sync::Arc;

use async_stream::try_stream;
use common::error::EngineError;
use common::model::query::QueryRequest;
use futures::stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::query_pipeline::{collect_stream, QueryPipeline};

/// Runs a query against every repository in `request.repos`, in request
/// order (§4.12 step 2: sequential by default), streaming each sub-
/// result's text as it completes (step 4). A single-repository request
/// degenerates to the plain single-repo path: no header is added and the
/// text streams through unmodified.
pub fn fan_out(
    pipeline: Arc<QueryPipeline>,
    request: QueryRequest,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<String, EngineError>> {
    try_stream! {
        if request.repos.is_empty() {
            Err(EngineError::Validation("query request names no repositories".to_string()))?;
        }
        let multi = request.repos.len() > 1;
        let user_text = request
            .last_user_text()
            .ok_or_else(|| EngineError::Validation("query has no user message".to_string()))?
            .to_string();

        for repo in &request.repos {
            let repo_id = repo.repo_id();
            info!(repo_id, "fan-out sub-request started");
            let outcome = pipeline.run_single(&request, repo, cancel.clone()).await?;
            let documents_retrieved = outcome.documents_retrieved;
            let (items, assistant_text) = collect_stream(outcome.stream).await;

            if multi {
                yield format!("--- {repo_id} ---\n");
            }
            for item in items {
                yield item?;
            }
            if multi {
                yield "\n\n".to_string();
            }

            pipeline.finalize(&request.session_id, &user_text, &assistant_text).await;

            let tokens_used = ingestion_pipeline::token_counter::count(
                &assistant_text,
                ingestion_pipeline::token_counter::TokenFamily::Bpe,
            );
            info!(repo_id, documents_retrieved, tokens_used, "fan-out sub-request complete");
        }
    }
}
