mod component;
mod message;
mod session;

pub use component::{ComponentArtifact, GeneratedBy};
pub use message::{ChatMessage, MessageMetadata, Role};
pub use session::{
    validate_description, validate_session_name, Session, SessionMetadata, SessionSettings,
    SessionSummary, MAX_DESCRIPTION_LENGTH, MAX_SESSION_NAME_LENGTH,
};
