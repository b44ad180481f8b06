use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation. Immutable once appended to a session;
/// ordering is append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens: Option<u32>,
    #[serde(default)]
    pub processing_time_ms: Option<u64>,
    /// URLs or data URIs for user-attached images.
    #[serde(default)]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.metadata.images = images;
        self
    }

    pub fn with_generation_stats(
        mut self,
        model: impl Into<String>,
        tokens: Option<u32>,
        processing_time_ms: u64,
    ) -> Self {
        self.metadata.model = Some(model.into());
        self.metadata.tokens = tokens;
        self.metadata.processing_time_ms = Some(processing_time_ms);
        self
    }
}
