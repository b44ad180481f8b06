use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single versioned generated-component result.
///
/// `version` is monotonically increasing within a session's component
/// lineage; [`crate::model::Session`] is the only place artifacts are
/// installed, so the numbering is enforced there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentArtifact {
    pub id: Uuid,
    pub name: String,
    pub jsx: String,
    #[serde(default)]
    pub css: String,
    /// Prop name → type description, as declared by the model.
    #[serde(default)]
    pub props: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub generated_by: Option<GeneratedBy>,
}

/// Provenance of an artifact: which assistant message produced it and the
/// user prompt that drove the call. Regeneration replays `prompt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedBy {
    pub message_id: Uuid,
    pub prompt: String,
}
