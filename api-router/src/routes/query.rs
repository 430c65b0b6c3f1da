//! The streaming query endpoint (SPEC_FULL.md §6), grounded on
//! `examples/original_source/backend/api/v1/chat.py`'s
//! `chat_completions_stream_endpoint` and
//! `examples/original_source/backend/models/chat.py`'s
//! `ChatCompletionRequest`. The handler is transport glue only: it
//! deserializes the request DTO, builds a `QueryRequest`, resolves the
//! provider/model binding (so a bad provider/model fails before any
//! bytes are sent), and streams C13's fan-out straight through,
//! terminated by the `[DONE]` sentinel line.

use axum::{body::Body, extract::State, response::IntoResponse, Json};
use common::model::query::{ChatMessage as EngineChatMessage, MessageRole, QueryRequest};
use common::model::repository::{FilterSet, HostKind, RepositoryDescriptor};
use common::utils::config::RepoFilterDefaults;
use futures::StreamExt;
use retrieval_pipeline::fan_out;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::api_state::ApiState;
use crate::error::ApiError;

/// `repo_url` accepts either a single locator or an array of locators
/// (§6, §9 example S6 "multi-repo fan-out").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepoUrlField {
    One(String),
    Many(Vec<String>),
}

impl RepoUrlField {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessageDto {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryHttpRequest {
    repo_url: RepoUrlField,
    messages: Vec<ChatMessageDto>,
    #[serde(rename = "filePath")]
    file_path: Option<String>,
    token: Option<String>,
    #[serde(rename = "type")]
    repo_type: Option<String>,
    provider: Option<String>,
    model: Option<String>,
    language: Option<String>,
    excluded_dirs: Option<String>,
    excluded_files: Option<String>,
    included_dirs: Option<String>,
    included_files: Option<String>,
    /// Not part of the original's DTO: the caller identity C11's
    /// conversation memory is keyed by (§3 "a process-scoped map keyed by
    /// caller identity"). Defaults to the joined repo locators so repeat
    /// queries against the same repository share history without the
    /// caller having to invent an id.
    session_id: Option<String>,
}

fn parse_host_kind(repo_type: Option<&str>) -> Result<HostKind, ApiError> {
    match repo_type.unwrap_or("github") {
        "github" => Ok(HostKind::Github),
        "gitlab" => Ok(HostKind::Gitlab),
        "bitbucket" => Ok(HostKind::Bitbucket),
        "local" => Ok(HostKind::Local),
        other => Err(ApiError::Validation(format!(
            "unsupported repository type '{other}'"
        ))),
    }
}

fn parse_role(role: &str) -> Result<MessageRole, ApiError> {
    match role {
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        other => Err(ApiError::Validation(format!("unknown message role '{other}'"))),
    }
}

/// Splits a newline-separated filter string into trimmed, non-empty
/// entries (§6 "four optional newline-separated filter strings").
fn parse_filter_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn resolve_list(requested: Vec<String>, default: &[String]) -> Vec<String> {
    if requested.is_empty() {
        default.to_vec()
    } else {
        requested
    }
}

fn build_filters(dto: &QueryHttpRequest, defaults: &RepoFilterDefaults) -> FilterSet {
    FilterSet {
        included_dirs: resolve_list(parse_filter_list(dto.included_dirs.as_deref()), &defaults.included_dirs),
        included_files: resolve_list(
            parse_filter_list(dto.included_files.as_deref()),
            &defaults.included_files,
        ),
        excluded_dirs: resolve_list(parse_filter_list(dto.excluded_dirs.as_deref()), &defaults.excluded_dirs),
        excluded_files: resolve_list(
            parse_filter_list(dto.excluded_files.as_deref()),
            &defaults.excluded_files,
        ),
    }
}

/// `POST /chat/completions/stream`: the external query interface.
/// Pre-stream failures (malformed request, unknown provider/model) are
/// returned as a structured [`ApiError`]; everything past that point
/// streams as plain text terminated by `[DONE]` (§6, §7).
pub async fn query_stream(
    State(state): State<ApiState>,
    Json(dto): Json<QueryHttpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if dto.messages.is_empty() {
        return Err(ApiError::Validation("messages must not be empty".to_string()));
    }
    let last_role = parse_role(
        &dto.messages
            .last()
            .expect("checked non-empty above")
            .role,
    )?;
    if last_role != MessageRole::User {
        return Err(ApiError::Validation(
            "the last message must be from the user".to_string(),
        ));
    }

    let host_kind = parse_host_kind(dto.repo_type.as_deref())?;
    let filters = build_filters(&dto, &state.repo_defaults);

    let messages = dto
        .messages
        .iter()
        .map(|m| {
            parse_role(&m.role).map(|role| EngineChatMessage {
                role,
                content: m.content.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let repo_urls = dto.repo_url.into_vec();
    if repo_urls.is_empty() {
        return Err(ApiError::Validation("repo_url must not be empty".to_string()));
    }

    let repos: Vec<RepositoryDescriptor> = repo_urls
        .iter()
        .map(|locator| RepositoryDescriptor {
            host_kind,
            locator: locator.clone(),
            credential: dto.token.clone(),
            filters: filters.clone(),
        })
        .collect();

    let session_id = dto.session_id.clone().unwrap_or_else(|| repo_urls.join(","));

    let request = QueryRequest {
        repos,
        messages,
        pinned_file_path: dto.file_path.clone(),
        language: dto.language.clone(),
        provider_id: dto.provider.clone(),
        model_id: dto.model.clone(),
        session_id,
    };

    // Fail fast on an unknown provider/model before any bytes are sent
    // (§7 "ValidationError ... pre-stream structured error").
    retrieval_pipeline::resolver::resolve(
        &state.generator_config,
        &state.registry,
        request.provider_id.as_deref(),
        request.model_id.as_deref(),
    )?;

    let cancel = CancellationToken::new();
    let answer_stream = fan_out(state.query_pipeline.clone(), request, cancel);

    let body_stream = answer_stream
        .map(|item| {
            let bytes = match item {
                Ok(text) => text.into_bytes(),
                Err(e) => {
                    error!(error = %e, "query stream terminated with an error");
                    format!("\n[error] {e}\n").into_bytes()
                }
            };
            Ok::<_, std::io::Error>(bytes)
        })
        .chain(futures::stream::once(async {
            Ok::<_, std::io::Error>(b"[DONE]\n".to_vec())
        }));

    Ok(Body::from_stream(body_stream))
}
