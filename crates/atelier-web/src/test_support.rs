use std::collections::BTreeMap;
use std::sync::Arc;

use atelier_core::config::AtelierConfig;
use atelier_core::events::EventBus;
use atelier_core::model::{Session, SessionSettings};
use atelier_core::parse::ParsedArtifact;
use atelier_core::storage::{SessionStore, SqliteStore};
use atelier_core::workflow::SessionLocks;
use axum::body::Body;
use http_body_util::BodyExt;
use uuid::Uuid;

use crate::AppState;

pub fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        store: SqliteStore::open_in_memory().unwrap(),
        llm: None,
        events: EventBus::new(),
        locks: SessionLocks::new(),
        config: AtelierConfig::default_config(),
        user_id: "test-user".to_string(),
    })
}

pub fn test_router() -> axum::Router {
    crate::routes::router().with_state(test_state())
}

pub async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Store a session owned by the default test user that already has one
/// generated component, and return its id.
pub async fn seed_session_with_component(state: &Arc<AppState>, name: &str) -> Uuid {
    let mut session = Session::new(
        "test-user".to_string(),
        "seeded".to_string(),
        SessionSettings::default(),
    );
    session.apply_generated(
        ParsedArtifact {
            jsx: format!("const {name} = () => <div />;"),
            css: format!(".{} {{}}", name.to_lowercase()),
            component_name: name.to_string(),
            description: "seeded component".to_string(),
            props: BTreeMap::new(),
        },
        Uuid::now_v7(),
        "seed prompt",
    );
    state.store.save_session(&session).await.unwrap();
    session.id
}
