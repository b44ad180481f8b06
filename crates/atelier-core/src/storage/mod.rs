mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{self, AtelierConfig};
use crate::error::Result;
use crate::model::Session;

/// Lightweight row for session listings: everything a dashboard needs
/// without hauling the chat history along.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListing {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub total_messages: usize,
    pub components_generated: u32,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionListing {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            description: session.description.clone(),
            total_messages: session.metadata.total_messages,
            components_generated: session.metadata.components_generated,
            last_accessed: session.last_accessed,
            created_at: session.created_at,
        }
    }
}

/// Abstract session store. The session aggregate is persisted as one
/// document; all lookups are scoped to the owning user.
pub trait SessionStore: Send + Sync {
    /// Persist the full aggregate (insert or replace).
    fn save_session(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch a session by id, scoped to `owner_id`. Soft-deleted sessions
    /// are still returned; they are only hidden from listings.
    fn get_session(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Session>> + Send;

    /// Active sessions for a user, most recently accessed first.
    fn list_sessions(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SessionListing>>> + Send;

    /// Hard delete. The web surface only soft-deletes; this exists for
    /// cleanup tooling and tests.
    fn delete_session(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Create the session store from configuration.
pub fn create_store(config: &AtelierConfig) -> Result<SqliteStore> {
    let path = match &config.storage.path {
        Some(p) => std::path::PathBuf::from(p),
        None => config::default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| crate::AtelierError::Storage(format!("cannot create data dir: {e}")))?;
    }
    SqliteStore::open(&path)
}
