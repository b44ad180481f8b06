mod error;
mod routes;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::Result;
use atelier_core::config::{self, AtelierConfig};
use atelier_core::events::EventBus;
use atelier_core::llm::LlmService;
use atelier_core::storage::{self, SqliteStore};
use atelier_core::workflow::SessionLocks;

pub struct AppState {
    pub store: SqliteStore,
    pub llm: Option<LlmService>,
    pub events: EventBus,
    pub locks: SessionLocks,
    pub config: AtelierConfig,
    pub user_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_web=info,atelier_core=info".parse().unwrap()),
        )
        .init();

    let current_dir = std::env::current_dir().ok();
    let config = AtelierConfig::load(current_dir.as_deref())
        .unwrap_or_else(|_| AtelierConfig::default_config());

    let store = storage::create_store(&config)?;
    tracing::info!("session store at {}", store.path().display());

    // Missing key or bad provider disables AI routes instead of refusing
    // to start; session CRUD and export still work.
    let llm = match LlmService::from_config(&config.llm) {
        Ok(service) => Some(service),
        Err(err) => {
            tracing::warn!("AI generation disabled: {err}");
            None
        }
    };

    let user_id = config::resolve_user_id(&config.user);

    let state = Arc::new(AppState {
        store,
        llm,
        events: EventBus::new(),
        locks: SessionLocks::new(),
        config: config.clone(),
        user_id,
    });

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("atelier-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
