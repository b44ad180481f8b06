//! Session-scoped notification bus. Chat and component-update events are
//! published after successful mutations; a live transport (websocket, SSE)
//! subscribes per session and forwards payloads to clients. The bus is
//! in-process only — the transport itself is an external collaborator.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{ChatMessage, ComponentArtifact};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// A new assistant chat message was appended.
    Message(ChatMessage),
    /// The session's current component changed.
    ComponentUpdated(ComponentArtifact),
}

/// Broadcast hub keyed by session id. Channels are created lazily on first
/// subscribe and dropped again once the last receiver goes away.
#[derive(Debug, Default)]
pub struct EventBus {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a live channel for a session.
    pub fn subscribe(&self, session_id: Uuid) -> broadcast::Receiver<SessionEvent> {
        let mut channels = self.channels.lock().expect("event bus lock");
        channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to the session's channel, if anyone is listening.
    /// Returns the number of live subscribers the event reached.
    pub fn publish(&self, session_id: Uuid, event: SessionEvent) -> usize {
        let mut channels = self.channels.lock().expect("event bus lock");
        let Some(sender) = channels.get(&session_id) else {
            return 0;
        };
        match sender.send(event) {
            Ok(received_by) => received_by,
            Err(_) => {
                // All receivers dropped; reclaim the channel.
                channels.remove(&session_id);
                0
            }
        }
    }

    /// Number of sessions with at least one open channel.
    pub fn live_sessions(&self) -> usize {
        self.channels.lock().expect("event bus lock").len()
    }
}
