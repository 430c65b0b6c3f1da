//! C9 Query Pipeline (SPEC_FULL.md §4.8): Prepare → Retrieve → Assemble →
//! Generate → Finalize, one staged run per repository in scope. Grounded
//! directly on the teacher's `pipeline::mod`'s `PipelineStage` /
//! `StrategyDriver` / `StageKind` / `PipelineStageTimings` shape — this
//! crate keeps the stage-trait-plus-timing-table idea but collapses the
//! teacher's family of interchangeable `StrategyDriver`s into one fixed
//! five-stage sequence, since the spec has no equivalent of swapping
//! retrieval strategy per call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::error::EngineError;
use common::model::chunk::Chunk;
use common::model::conversation::DialogTurn;
use common::model::provider::ProviderBinding;
use common::model::query::{MessageRole, QueryRequest};
use common::model::repository::RepositoryIndex;
use common::storage::vector_store::SimilarityIndex;
use common::utils::config::{EmbedderConfig, GeneratorConfig};
use futures::StreamExt;
use ingestion_pipeline::IngestionPipeline;
use providers::{ChatMessage as ProviderMessage, ChatRequest, ChatRole, EmbedProvider, LlmProvider, ProviderRegistry, TextStream};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::deep_research::{self, ResearchPhase};
use crate::memory::ConversationStore;
use crate::modes;
use crate::resolver;

/// Identifies one stage of the pipeline for timing and tracing, mirroring
/// the teacher's `StageKind`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Prepare,
    Retrieve,
    Assemble,
    Generate,
}

/// Accumulated per-stage wall-clock durations for one query run, mirroring
/// the teacher's `PipelineStageTimings`.
#[derive(Debug, Default)]
pub struct PipelineStageTimings(Vec<(StageKind, Duration)>);

impl PipelineStageTimings {
    pub fn record(&mut self, kind: StageKind, duration: Duration) {
        self.0.push((kind, duration));
    }

    pub fn into_vec(self) -> Vec<(StageKind, Duration)> {
        self.0
    }
}

/// Mutable state threaded through the five stages of one repository's
/// query run.
pub struct QueryContext<'a> {
    pub request: &'a QueryRequest,
    pub repo: &'a common::model::repository::RepositoryDescriptor,
    pub history: Vec<DialogTurn>,
    pub binding: ProviderBinding,
    pub index: Option<RepositoryIndex>,
    pub research: Option<deep_research::Resolution>,
    pub retrieved: Vec<(Chunk, f32)>,
    pub system_prompt: String,
    pub chat_messages: Vec<ProviderMessage>,
    pub simplified: bool,
}

/// What one call to [`QueryPipeline::run_single`] hands back to its caller:
/// the resolved research phase, the generator's text stream, and how many
/// chunks were retrieved (0 when the token-limit fallback dropped them).
pub struct RunOutcome {
    pub phase: ResearchPhase,
    pub stream: TextStream,
    pub documents_retrieved: usize,
}

/// One step of the Query Pipeline, analogous to the teacher's
/// `PipelineStage` trait.
#[async_trait]
trait PipelineStage: Send + Sync {
    fn kind(&self) -> StageKind;
    async fn execute(&self, ctx: &mut QueryContext<'_>, deps: &StageDeps) -> Result<(), EngineError>;
}

/// Shared handles every stage needs but that don't belong on
/// [`QueryContext`] (they outlive any single run).
struct StageDeps {
    ingestion: Arc<IngestionPipeline>,
    registry: Arc<ProviderRegistry>,
    embedder_config: EmbedderConfig,
}

struct PrepareStage;

#[async_trait]
impl PipelineStage for PrepareStage {
    fn kind(&self) -> StageKind {
        StageKind::Prepare
    }

    async fn execute(&self, ctx: &mut QueryContext<'_>, deps: &StageDeps) -> Result<(), EngineError> {
        let index = deps.ingestion.ingest(ctx.repo).await?;
        ctx.request
            .last_user_text()
            .ok_or_else(|| EngineError::Validation("query has no user message".to_string()))?;
        let research = deep_research::resolve(&ctx.request.messages, &ctx.history);
        ctx.index = Some(index);
        ctx.research = Some(research);
        Ok(())
    }
}

struct RetrieveStage;

#[async_trait]
impl PipelineStage for RetrieveStage {
    fn kind(&self) -> StageKind {
        StageKind::Retrieve
    }

    async fn execute(&self, ctx: &mut QueryContext<'_>, deps: &StageDeps) -> Result<(), EngineError> {
        if ctx.simplified {
            ctx.retrieved.clear();
            return Ok(());
        }
        let research = ctx
            .research
            .as_ref()
            .ok_or_else(|| EngineError::Internal("retrieve stage ran before prepare stage".to_string()))?;
        let index = ctx
            .index
            .as_ref()
            .ok_or_else(|| EngineError::Internal("retrieve stage ran before prepare stage".to_string()))?;

        let embedder = deps.registry.embedder(&deps.embedder_config.provider)?;
        let query_vector = embedder.embed_query(&research.topic, &deps.embedder_config.model).await?;
        let hits = SimilarityIndex::build(&index.chunks).search(&query_vector, deps.embedder_config.top_k);
        ctx.retrieved = hits
            .into_iter()
            .filter_map(|(idx, score)| index.chunks.get(idx).cloned().map(|c| (c, score)))
            .collect();
        Ok(())
    }
}

struct AssembleStage;

#[async_trait]
impl PipelineStage for AssembleStage {
    fn kind(&self) -> StageKind {
        StageKind::Assemble
    }

    async fn execute(&self, ctx: &mut QueryContext<'_>, deps: &StageDeps) -> Result<(), EngineError> {
        let research = ctx
            .research
            .as_ref()
            .ok_or_else(|| EngineError::Internal("assemble stage ran before prepare stage".to_string()))?;

        let system_prompt = modes::system_prompt(
            research.phase,
            std::slice::from_ref(ctx.repo),
            ctx.request.language.as_deref(),
        );

        let mut messages = vec![ProviderMessage {
            role: ChatRole::System,
            content: system_prompt.clone(),
        }];

        // A deep-research request resends its own transcript (the "##
        // Research Plan" turns the caller got back); when it does, that's
        // the prior-turn source of truth and must not be dropped in favor
        // of (empty, fresh-session) server-side memory. Otherwise fall back
        // to conversation memory, as ordinary chat turns do.
        if ctx.request.messages.len() > 1 {
            for msg in &ctx.request.messages[..ctx.request.messages.len() - 1] {
                messages.push(ProviderMessage {
                    role: match msg.role {
                        MessageRole::User => ChatRole::User,
                        MessageRole::Assistant => ChatRole::Assistant,
                    },
                    content: msg.content.clone(),
                });
            }
        } else {
            for turn in &ctx.history {
                messages.push(ProviderMessage {
                    role: ChatRole::User,
                    content: turn.user_text.clone(),
                });
                messages.push(ProviderMessage {
                    role: ChatRole::Assistant,
                    content: turn.assistant_text.clone(),
                });
            }
        }

        if !ctx.simplified {
            if let Some(path) = &ctx.request.pinned_file_path {
                if let Some(local_tree) = deps.ingestion.storage().resolve_local_path(
                    &common::storage::vector_store::repo_tree_location(&ctx.repo.repo_id()),
                ) {
                    let http = reqwest::Client::new();
                    if let Ok(content) = ingestion_pipeline::acquire::fetch_pinned_file(&http, ctx.repo, &local_tree, path).await {
                        messages.push(ProviderMessage {
                            role: ChatRole::User,
                            content: format!("Pinned file `{path}`:\n```\n{content}\n```"),
                        });
                    }
                }
            }
        }

        if !ctx.retrieved.is_empty() {
            let context_block = ctx
                .retrieved
                .iter()
                .map(|(chunk, score)| format!("--- {} (score {:.3}) ---\n{}", chunk.source_path, score, chunk.text))
                .collect::<Vec<_>>()
                .join("\n\n");
            messages.push(ProviderMessage {
                role: ChatRole::User,
                content: format!("Retrieved context:\n\n{context_block}"),
            });
        }

        messages.push(ProviderMessage {
            role: ChatRole::User,
            content: research.topic.clone(),
        });

        ctx.system_prompt = system_prompt;
        ctx.chat_messages = messages;
        Ok(())
    }
}

/// Runs the stages in order, recording timings exactly as the teacher's
/// `run_with_driver` loop does.
async fn run_stages(
    stages: &[Box<dyn PipelineStage>],
    ctx: &mut QueryContext<'_>,
    deps: &StageDeps,
) -> Result<PipelineStageTimings, EngineError> {
    let mut timings = PipelineStageTimings::default();
    for stage in stages {
        let started = Instant::now();
        stage.execute(ctx, deps).await?;
        timings.record(stage.kind(), started.elapsed());
    }
    Ok(timings)
}

/// Top-level orchestrator: owns the long-lived handles the Query Pipeline
/// needs across every call (providers, ingestion, conversation memory).
pub struct QueryPipeline {
    ingestion: Arc<IngestionPipeline>,
    registry: Arc<ProviderRegistry>,
    generator_config: GeneratorConfig,
    embedder_config: EmbedderConfig,
    conversations: ConversationStore,
}

impl QueryPipeline {
    pub fn new(
        ingestion: Arc<IngestionPipeline>,
        registry: Arc<ProviderRegistry>,
        generator_config: GeneratorConfig,
        embedder_config: EmbedderConfig,
    ) -> Self {
        Self {
            ingestion,
            registry,
            generator_config,
            embedder_config,
            conversations: ConversationStore::new(),
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Runs the Prepare/Retrieve/Assemble/Generate stages for one
    /// repository, returning the resolved phase, the answer stream, and
    /// how many chunks were retrieved (§4.8, §4.12 "documents_retrieved").
    pub async fn run_single(
        &self,
        request: &QueryRequest,
        repo: &common::model::repository::RepositoryDescriptor,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let history = self.conversations.snapshot(&request.session_id).await;
        let binding = resolver::resolve(
            &self.generator_config,
            &self.registry,
            request.provider_id.as_deref(),
            request.model_id.as_deref(),
        )?;

        let deps = StageDeps {
            ingestion: self.ingestion.clone(),
            registry: self.registry.clone(),
            embedder_config: self.embedder_config.clone(),
        };

        let stages: Vec<Box<dyn PipelineStage>> =
            vec![Box::new(PrepareStage), Box::new(RetrieveStage), Box::new(AssembleStage)];

        let mut ctx = QueryContext {
            request,
            repo,
            history,
            binding: binding.clone(),
            index: None,
            research: None,
            retrieved: Vec::new(),
            system_prompt: String::new(),
            chat_messages: Vec::new(),
            simplified: false,
        };

        info!(
            repo_id = %repo.repo_id(),
            session_id = %request.session_id,
            provider_id = %ctx.binding.provider_id,
            model_id = %ctx.binding.model_id,
            "query pipeline started"
        );
        let timings = run_stages(&stages, &mut ctx, &deps).await?;
        for (kind, duration) in timings.into_vec() {
            info!(?kind, micros = duration.as_micros(), "query pipeline stage complete");
        }

        let documents_retrieved = ctx.retrieved.len();
        let phase = ctx.research.as_ref().map(|r| r.phase).unwrap_or(ResearchPhase::SimpleChat);

        let generator = self.registry.generator(&binding.provider_id)?;
        match self.generate(&generator, &binding, &ctx.chat_messages, cancel.clone()).await {
            Ok(stream) => Ok(RunOutcome {
                phase,
                stream,
                documents_retrieved,
            }),
            Err(e) if e.is_token_limit() => {
                info!(repo_id = %repo.repo_id(), "token limit exceeded, retrying with simplified prompt");
                ctx.simplified = true;
                ctx.retrieved.clear();
                let simplify_stages: Vec<Box<dyn PipelineStage>> = vec![Box::new(AssembleStage)];
                run_stages(&simplify_stages, &mut ctx, &deps).await?;
                let stream = self.generate(&generator, &binding, &ctx.chat_messages, cancel).await?;
                Ok(RunOutcome {
                    phase,
                    stream,
                    documents_retrieved: 0,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn generate(
        &self,
        generator: &Arc<dyn LlmProvider>,
        binding: &ProviderBinding,
        messages: &[ProviderMessage],
        cancel: CancellationToken,
    ) -> Result<TextStream, EngineError> {
        let request = ChatRequest {
            model_id: binding.model_id.clone(),
            messages: messages.to_vec(),
            params: binding.params.clone(),
        };
        generator.acall(request, cancel).await
    }

    /// Finalize stage: drains `stream` fully, recording the full assistant
    /// text into conversation memory once generation completes
    /// successfully. Skipped entirely if the caller cancels or the stream
    /// yields no output, matching the teacher's "Finalize only runs past a
    /// successful generation" behavior.
    pub async fn finalize(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        if assistant_text.is_empty() {
            return;
        }
        self.conversations.append(session_id, user_text, assistant_text).await;
    }
}

/// Wraps a provider's [`TextStream`] so callers both see each chunk as it
/// arrives and recover the fully assembled text for [`QueryPipeline::finalize`].
pub async fn collect_stream(mut stream: TextStream) -> (Vec<Result<String, EngineError>>, String) {
    let mut seen = Vec::new();
    let mut full_text = String::new();
    while let Some(item) = stream.next().await {
        if let Ok(text) = &item {
            full_text.push_str(text);
        }
        seen.push(item);
    }
    (seen, full_text)
}

