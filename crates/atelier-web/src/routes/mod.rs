pub mod ai;
pub mod export;
pub mod sessions;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use atelier_core::storage::SessionStore;

use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .merge(sessions::routes())
        .merge(ai::routes())
        .merge(export::routes())
}

/// Session owner for a request: the `x-user-id` header when present,
/// otherwise the configured single-user identity.
pub(crate) fn owner_id(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| state.user_id.clone())
}

async fn health(
    State(state): State<Arc<AppState>>,
) -> (axum::http::StatusCode, Json<serde_json::Value>) {
    let store_ok = state.store.list_sessions(&state.user_id, 1).await.is_ok();

    let status = if store_ok {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": if store_ok { "ok" } else { "degraded" },
            "store": if store_ok { "connected" } else { "unavailable" },
            "ai": state.llm.as_ref().map(|l| l.provider_name()).unwrap_or("disabled"),
            "live_sessions": state.events.live_sessions(),
        })),
    )
}
