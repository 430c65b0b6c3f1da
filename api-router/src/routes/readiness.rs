use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: returns 200 if at least one provider is credentialed
/// and ready to serve generations, else 503. There is no database to
/// check against; the engine's only external dependency at rest is
/// having a usable provider registered (§6 "Missing credentials produce
/// a user-actionable error at first call" — readiness surfaces that
/// condition ahead of time instead).
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let providers = state.registry.known_provider_ids();
    if providers.is_empty() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "checks": { "providers": "none configured" },
            })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "checks": { "providers": providers },
            })),
        )
    }
}
