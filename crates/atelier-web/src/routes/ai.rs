use std::sync::Arc;

use atelier_core::llm::{CompletionBackend, CompletionParams, LlmService};
use atelier_core::prompt::Message;
use atelier_core::workflow::{self, ChatOutcome, ChatRequest};
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::owner_id;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/sessions/{id}/chat", post(chat))
        .route("/api/v1/sessions/{id}/refine", post(refine))
        .route("/api/v1/sessions/{id}/regenerate", post(regenerate))
        .route("/api/v1/ai/models", get(models))
        .route("/api/v1/ai/test", post(test_connection))
}

fn require_llm(state: &AppState) -> Result<&LlmService, ApiError> {
    state.llm.as_ref().ok_or_else(|| {
        ApiError::unavailable("AI generation is not configured (set llm.api_key or OPENAI_API_KEY)")
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let llm = require_llm(&state)?;
    let outcome = workflow::chat(
        &state.store,
        llm,
        &state.events,
        &state.locks,
        &state.config.generation,
        id,
        &owner_id(&headers, &state),
        req,
    )
    .await?;
    Ok(Json(outcome))
}

async fn refine(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let llm = require_llm(&state)?;
    let outcome = workflow::refine(
        &state.store,
        llm,
        &state.events,
        &state.locks,
        id,
        &owner_id(&headers, &state),
        req,
    )
    .await?;
    Ok(Json(outcome))
}

async fn regenerate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatOutcome>, ApiError> {
    let llm = require_llm(&state)?;
    let outcome = workflow::regenerate(
        &state.store,
        llm,
        &state.events,
        &state.locks,
        &state.config.generation,
        id,
        &owner_id(&headers, &state),
    )
    .await?;
    Ok(Json(outcome))
}

/// Connectivity diagnostic: one canned completion against the configured
/// provider, no session involved.
async fn test_connection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let llm = require_llm(&state)?;

    let messages = vec![Message::user("Reply with the single word: ok")];
    let params = CompletionParams {
        model: state.config.generation.default_model.clone(),
        temperature: 0.0,
        max_tokens: 20,
    };
    let completion = llm.complete(&messages, &params).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "provider": llm.provider_name(),
        "model": params.model,
        "response": completion.text,
    })))
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    id: &'static str,
    name: &'static str,
    provider: &'static str,
}

/// Model catalog shown in the session settings picker.
async fn models() -> Json<Vec<ModelInfo>> {
    Json(vec![
        ModelInfo {
            id: "gpt-4o-mini",
            name: "GPT-4o mini",
            provider: "openai",
        },
        ModelInfo {
            id: "gpt-4-turbo",
            name: "GPT-4 Turbo",
            provider: "openai",
        },
        ModelInfo {
            id: "anthropic/claude-3-haiku",
            name: "Claude 3 Haiku",
            provider: "openrouter",
        },
        ModelInfo {
            id: "meta-llama/llama-3.1-8b-instruct",
            name: "Llama 3.1 8B Instruct",
            provider: "openrouter",
        },
    ])
}
