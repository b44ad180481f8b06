use std::sync::Arc;

use atelier_core::export::{self, ExportFile, ExportFormat, ExportOptions};
use atelier_core::storage::SessionStore;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::owner_id;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/sessions/{id}/export/component", get(export_component))
        .route("/api/v1/sessions/{id}/export/code", get(export_code))
        .route("/api/v1/sessions/{id}/export/history", get(export_history))
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    #[serde(default)]
    format: ExportFormat,
    #[serde(default)]
    package_json: Option<bool>,
    #[serde(default)]
    readme: Option<bool>,
    #[serde(default)]
    example: Option<bool>,
}

impl From<ExportQuery> for ExportOptions {
    fn from(query: ExportQuery) -> Self {
        let defaults = ExportOptions::default();
        Self {
            format: query.format,
            include_package_json: query.package_json.unwrap_or(defaults.include_package_json),
            include_readme: query.readme.unwrap_or(defaults.include_readme),
            include_example: query.example.unwrap_or(defaults.include_example),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportBundle {
    component: String,
    version: u32,
    files: Vec<ExportFile>,
}

/// Full export bundle for the current component.
async fn export_component(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<ExportBundle>, ApiError> {
    let session = state
        .store
        .get_session(id, &owner_id(&headers, &state))
        .await?;
    let component = session
        .current_component
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("session has no component to export"))?;

    let files = export::assemble_component(component, &session, &query.into());
    Ok(Json(ExportBundle {
        component: component.name.clone(),
        version: component.version,
        files,
    }))
}

/// Just the source and stylesheet of the current component, for
/// copy-to-clipboard use.
async fn export_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .store
        .get_session(id, &owner_id(&headers, &state))
        .await?;
    let component = session
        .current_component
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("session has no component to export"))?;

    Ok(Json(serde_json::json!({
        "componentName": component.name,
        "version": component.version,
        "jsx": component.jsx,
        "css": component.css,
        "props": component.props,
    })))
}

/// Every version the session has produced, grouped per version, plus a
/// session summary.
async fn export_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .store
        .get_session(id, &owner_id(&headers, &state))
        .await?;

    let files = export::assemble_history(&session, &query.into());
    Ok(Json(serde_json::json!({
        "session": session.name,
        "files": files,
    })))
}
