use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AtelierError, Result};
use crate::model::{ChatMessage, ComponentArtifact, GeneratedBy};
use crate::parse::ParsedArtifact;

pub const MAX_SESSION_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

pub fn validate_session_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AtelierError::InvalidInput(
            "session name cannot be empty".into(),
        ));
    }
    if trimmed.len() > MAX_SESSION_NAME_LENGTH {
        return Err(AtelierError::InvalidInput(format!(
            "session name exceeds maximum length of {MAX_SESSION_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(AtelierError::InvalidInput(format!(
            "description exceeds maximum length of {MAX_DESCRIPTION_LENGTH} characters"
        )));
    }
    Ok(())
}

/// A user-owned conversation + component-generation workspace.
///
/// The session is the unit of mutation: operations load it, mutate it in
/// memory through the methods below, and persist it as one document.
/// Invariants held by those methods:
///
/// - `metadata.total_messages == chat_history.len()` after every mutation.
/// - `current_component` is never replaced without the prior value being
///   archived into `component_history` first.
/// - Artifact versions increase by exactly 1 per component-producing
///   operation, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub current_component: Option<ComponentArtifact>,
    #[serde(default)]
    pub component_history: Vec<ComponentArtifact>,
    pub settings: SessionSettings,
    #[serde(default)]
    pub metadata: SessionMetadata,
    pub is_active: bool,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub auto_save: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub total_messages: usize,
    pub total_tokens_used: u64,
    pub components_generated: u32,
}

/// The slice of session state returned alongside chat results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub last_accessed: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(owner_id: String, name: String, settings: SessionSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id,
            name,
            description: None,
            chat_history: Vec::new(),
            current_component: None,
            component_history: Vec::new(),
            settings,
            metadata: SessionMetadata::default(),
            is_active: true,
            last_accessed: now,
            created_at: now,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Update `last_accessed`. Called on every read or mutation.
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    /// Soft delete: hides the session from listings without erasing data.
    pub fn soft_delete(&mut self) {
        self.is_active = false;
        self.touch();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            last_accessed: self.last_accessed,
            metadata: self.metadata.clone(),
        }
    }

    // ── message log ────────────────────────────────────────────────────

    /// Append a chat turn. Messages are never mutated or removed once
    /// appended; counters are recomputed here so they cannot drift.
    pub fn record_message(&mut self, message: ChatMessage) -> &ChatMessage {
        if let Some(tokens) = message.metadata.tokens {
            self.metadata.total_tokens_used += u64::from(tokens);
        }
        self.chat_history.push(message);
        self.metadata.total_messages = self.chat_history.len();
        self.touch();
        self.chat_history.last().expect("just pushed")
    }

    // ── component version manager ──────────────────────────────────────

    /// Install a freshly generated artifact: version 1 when the session has
    /// no current component, otherwise current version + 1.
    pub fn apply_generated(
        &mut self,
        parsed: ParsedArtifact,
        message_id: Uuid,
        prompt: &str,
    ) -> &ComponentArtifact {
        let artifact = self.build_artifact(parsed.component_name.clone(), parsed, message_id, prompt);
        self.install(artifact)
    }

    /// Install a refined artifact. Refinement modifies, not renames: the
    /// new version keeps the current component's `name`.
    pub fn apply_refinement(
        &mut self,
        parsed: ParsedArtifact,
        message_id: Uuid,
        prompt: &str,
    ) -> Result<&ComponentArtifact> {
        let name = self
            .current_component
            .as_ref()
            .map(|c| c.name.clone())
            .ok_or_else(|| {
                AtelierError::InvalidState("no component to refine in this session".into())
            })?;
        let artifact = self.build_artifact(name, parsed, message_id, prompt);
        Ok(self.install(artifact))
    }

    /// Install a regenerated artifact. Identical to [`apply_generated`]
    /// except the caller supplies the *original* generation prompt, which
    /// is echoed into `generated_by.prompt`.
    ///
    /// [`apply_generated`]: Session::apply_generated
    pub fn apply_regeneration(
        &mut self,
        parsed: ParsedArtifact,
        message_id: Uuid,
        original_prompt: &str,
    ) -> &ComponentArtifact {
        let artifact =
            self.build_artifact(parsed.component_name.clone(), parsed, message_id, original_prompt);
        self.install(artifact)
    }

    fn build_artifact(
        &self,
        name: String,
        parsed: ParsedArtifact,
        message_id: Uuid,
        prompt: &str,
    ) -> ComponentArtifact {
        let version = self
            .current_component
            .as_ref()
            .map(|c| c.version + 1)
            .unwrap_or(1);

        ComponentArtifact {
            id: Uuid::now_v7(),
            name,
            jsx: parsed.jsx,
            css: parsed.css,
            props: parsed.props,
            description: parsed.description,
            version,
            created_at: Utc::now(),
            generated_by: Some(GeneratedBy {
                message_id,
                prompt: prompt.to_string(),
            }),
        }
    }

    /// Archive-then-replace as a single transition. The outgoing current
    /// component (if any) is appended to history before the new artifact
    /// becomes current; no artifact is ever silently dropped.
    fn install(&mut self, artifact: ComponentArtifact) -> &ComponentArtifact {
        if let Some(outgoing) = self.current_component.take() {
            self.component_history.push(outgoing);
        }
        self.current_component = Some(artifact);
        self.metadata.components_generated += 1;
        self.touch();
        self.current_component.as_ref().expect("just installed")
    }
}
