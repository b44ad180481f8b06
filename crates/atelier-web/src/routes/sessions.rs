use std::sync::Arc;

use atelier_core::config::{MAX_TOKENS_RANGE, TEMPERATURE_RANGE};
use atelier_core::model::{
    validate_description, validate_session_name, Session, SessionSettings,
};
use atelier_core::storage::{SessionListing, SessionStore};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::owner_id;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/v1/sessions",
            get(list_sessions).post(create_session),
        )
        .route(
            "/api/v1/sessions/{id}",
            get(get_session).patch(update_session).delete(delete_session),
        )
}

// -- Request/Response types --

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    settings: Option<SettingsPatch>,
}

/// Partial settings update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
struct SettingsPatch {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    auto_save: Option<bool>,
}

impl SettingsPatch {
    /// Fold the patch into existing settings, clamping numeric values to
    /// their documented ranges instead of rejecting the request.
    fn apply(self, settings: &mut SessionSettings) {
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(temperature) = self.temperature {
            let (min, max) = TEMPERATURE_RANGE;
            settings.temperature = temperature.clamp(min, max);
        }
        if let Some(max_tokens) = self.max_tokens {
            let (min, max) = MAX_TOKENS_RANGE;
            settings.max_tokens = max_tokens.clamp(min, max);
        }
        if let Some(auto_save) = self.auto_save {
            settings.auto_save = auto_save;
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateSessionRequest {
    name: Option<String>,
    description: Option<String>,
    settings: Option<SettingsPatch>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

// -- Handlers --

async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    validate_session_name(&req.name)?;
    if let Some(ref description) = req.description {
        validate_description(description)?;
    }

    let mut settings = SessionSettings {
        model: state.config.generation.default_model.clone(),
        temperature: state.config.generation.default_temperature,
        max_tokens: state.config.generation.default_max_tokens,
        auto_save: true,
    };
    if let Some(patch) = req.settings {
        patch.apply(&mut settings);
    }

    let session = Session::new(owner_id(&headers, &state), req.name.trim().to_string(), settings)
        .with_description(req.description);
    state.store.save_session(&session).await?;

    tracing::info!(session_id = %session.id, "created session");
    Ok(Json(session))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SessionListing>>, ApiError> {
    let listings = state
        .store
        .list_sessions(&owner_id(&headers, &state), query.limit)
        .await?;
    Ok(Json(listings))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let owner = owner_id(&headers, &state);
    let _guard = state.locks.acquire(id).await;
    let mut session = state.store.get_session(id, &owner).await?;
    // Reads count as access.
    session.touch();
    state.store.save_session(&session).await?;
    Ok(Json(session))
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    let owner = owner_id(&headers, &state);
    let _guard = state.locks.acquire(id).await;
    let mut session = state.store.get_session(id, &owner).await?;

    if let Some(name) = req.name {
        validate_session_name(&name)?;
        session.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        validate_description(&description)?;
        session.description = Some(description);
    }
    if let Some(patch) = req.settings {
        patch.apply(&mut session.settings);
    }

    session.touch();
    state.store.save_session(&session).await?;
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let owner = owner_id(&headers, &state);
    let _guard = state.locks.acquire(id).await;
    let mut session = state.store.get_session(id, &owner).await?;

    // Soft delete: the session drops out of listings but its data stays.
    session.soft_delete();
    state.store.save_session(&session).await?;

    tracing::info!(session_id = %id, "soft-deleted session");
    Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
}
