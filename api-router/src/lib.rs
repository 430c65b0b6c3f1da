use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    config::{get_lang_config, get_model_config},
    liveness::live,
    query::query_stream,
    readiness::ready,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1. No business logic lives here
/// (SPEC_FULL.md §6 "a small `api-router` crate: axum `Router` builder
/// functions, no business logic") — every handler's job is to deserialize
/// a request, call into `retrieval-pipeline`/`providers`, and translate
/// the result back to HTTP.
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    api_state::ApiState: FromRef<S>,
{
    Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/chat/completions/stream", post(query_stream))
        .route("/models/config", get(get_model_config))
        .route("/lang/config", get(get_lang_config))
}
