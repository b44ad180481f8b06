//! The chat / refine / regenerate operations. Each is one sequential unit
//! of work — load session, mutate in memory, persist — with the provider
//! call as the only suspending step in the middle.
//!
//! Failure policy: the user's own message is persisted *before* the
//! provider call, and provider failures (errors and timeouts) append a
//! synthetic assistant error message, so conversation continuity survives
//! a failed generation. An unparseable reply leaves the session as the
//! user message left it. Partial AI output is never stored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::error::{AtelierError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::llm::{CompletionBackend, CompletionParams};
use crate::model::{ChatMessage, ComponentArtifact, Session, SessionSummary};
use crate::prompt;
use crate::storage::SessionStore;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Result of a successful component-producing operation, shaped for the
/// route layer to serialize directly.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub assistant_message: ChatMessage,
    pub component: ComponentArtifact,
    pub session: SessionSummary,
}

/// Per-session mutual exclusion for mutating operations. The lock is held
/// across the whole load-mutate-persist span, so concurrent refine and
/// regenerate calls on one session serialize instead of silently losing
/// the earlier write.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: std::sync::Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("session locks");
            Arc::clone(locks.entry(session_id).or_default())
        };
        lock.lock_owned().await
    }
}

/// Send a chat message and generate a component from it.
pub async fn chat<S, C>(
    store: &S,
    llm: &C,
    events: &EventBus,
    locks: &SessionLocks,
    generation: &GenerationConfig,
    session_id: Uuid,
    owner_id: &str,
    request: ChatRequest,
) -> Result<ChatOutcome>
where
    S: SessionStore,
    C: CompletionBackend,
{
    let _guard = locks.acquire(session_id).await;
    let mut session = store.get_session(session_id, owner_id).await?;

    let user_message = ChatMessage::user(&request.content).with_images(request.images.clone());
    session.record_message(user_message);
    store.save_session(&session).await?;

    // The in-flight request is the final user message of the prompt, so the
    // context window excludes the turn we just recorded.
    let prior_turns = &session.chat_history[..session.chat_history.len() - 1];
    let prompt_text = prompt::enhance_with_images(&request.content, &request.images);
    let messages =
        prompt::build_generation(&prompt_text, prior_turns, generation.history_window);

    let params = CompletionParams {
        model: session.settings.model.clone(),
        temperature: session.settings.temperature,
        max_tokens: session.settings.max_tokens,
    };

    complete_and_apply(
        store,
        llm,
        events,
        session,
        messages,
        params,
        Operation::Generate {
            prompt: request.content,
        },
    )
    .await
}

/// Refine the session's current component with a modification request.
pub async fn refine<S, C>(
    store: &S,
    llm: &C,
    events: &EventBus,
    locks: &SessionLocks,
    session_id: Uuid,
    owner_id: &str,
    request: ChatRequest,
) -> Result<ChatOutcome>
where
    S: SessionStore,
    C: CompletionBackend,
{
    let _guard = locks.acquire(session_id).await;
    let mut session = store.get_session(session_id, owner_id).await?;

    let current = session.current_component.clone().ok_or_else(|| {
        AtelierError::InvalidState("no component to refine in this session".into())
    })?;

    let user_message = ChatMessage::user(format!("Refine component: {}", request.content));
    session.record_message(user_message);
    store.save_session(&session).await?;

    let messages = prompt::build_refinement(&current, &request.content);
    let params = CompletionParams {
        model: session.settings.model.clone(),
        temperature: session.settings.temperature,
        max_tokens: session.settings.max_tokens,
    };

    complete_and_apply(
        store,
        llm,
        events,
        session,
        messages,
        params,
        Operation::Refine {
            prompt: request.content,
        },
    )
    .await
}

/// Re-run the current component's original generation prompt for an
/// alternative result. No user message is appended; regeneration is a
/// replay, not a new request.
pub async fn regenerate<S, C>(
    store: &S,
    llm: &C,
    events: &EventBus,
    locks: &SessionLocks,
    generation: &GenerationConfig,
    session_id: Uuid,
    owner_id: &str,
) -> Result<ChatOutcome>
where
    S: SessionStore,
    C: CompletionBackend,
{
    let _guard = locks.acquire(session_id).await;
    let session = store.get_session(session_id, owner_id).await?;

    let original_prompt = session
        .current_component
        .as_ref()
        .and_then(|c| c.generated_by.as_ref())
        .map(|g| g.prompt.clone())
        .ok_or_else(|| {
            AtelierError::InvalidState("no component to regenerate in this session".into())
        })?;

    let messages = prompt::build_regeneration(
        &original_prompt,
        &session.chat_history,
        generation.history_window,
    );

    let params = CompletionParams {
        model: session.settings.model.clone(),
        // Nudged upward to encourage variation, clamped to the documented range.
        temperature: prompt::regeneration_temperature(
            session.settings.temperature,
            generation.regenerate_temperature_bump,
        ),
        max_tokens: session.settings.max_tokens,
    };

    complete_and_apply(
        store,
        llm,
        events,
        session,
        messages,
        params,
        Operation::Regenerate {
            original_prompt,
        },
    )
    .await
}

enum Operation {
    Generate { prompt: String },
    Refine { prompt: String },
    Regenerate { original_prompt: String },
}

impl Operation {
    fn success_verb(&self) -> &'static str {
        match self {
            Operation::Generate { .. } => "Generated",
            Operation::Refine { .. } => "Refined",
            Operation::Regenerate { .. } => "Regenerated",
        }
    }
}

/// Shared tail of every component-producing operation: call the provider,
/// parse, record the assistant turn, install the new artifact version,
/// persist, notify.
async fn complete_and_apply<S, C>(
    store: &S,
    llm: &C,
    events: &EventBus,
    mut session: Session,
    messages: Vec<prompt::Message>,
    params: CompletionParams,
    operation: Operation,
) -> Result<ChatOutcome>
where
    S: SessionStore,
    C: CompletionBackend,
{
    let started = Instant::now();

    let completion = match llm.complete(&messages, &params).await {
        Ok(completion) => completion,
        Err(err) => {
            record_failure(store, &mut session, &err).await;
            return Err(err);
        }
    };

    // A reply with no recoverable code is not a provider outage; the
    // session keeps only the already-persisted user message.
    let parsed = crate::parse::parse(&completion.text)?;

    let processing_time_ms = started.elapsed().as_millis() as u64;

    let assistant_message = ChatMessage::assistant(format!(
        "{} component: {}",
        operation.success_verb(),
        parsed.component_name
    ))
    .with_generation_stats(&params.model, completion.total_tokens, processing_time_ms);
    let assistant_id = assistant_message.id;
    let assistant_message = session.record_message(assistant_message).clone();

    let component = match &operation {
        Operation::Generate { prompt } => {
            session.apply_generated(parsed, assistant_id, prompt).clone()
        }
        Operation::Refine { prompt } => session
            .apply_refinement(parsed, assistant_id, prompt)?
            .clone(),
        Operation::Regenerate { original_prompt } => session
            .apply_regeneration(parsed, assistant_id, original_prompt)
            .clone(),
    };

    store.save_session(&session).await?;

    events.publish(session.id, SessionEvent::Message(assistant_message.clone()));
    events.publish(
        session.id,
        SessionEvent::ComponentUpdated(component.clone()),
    );

    tracing::info!(
        session_id = %session.id,
        component = %component.name,
        version = component.version,
        tokens = ?completion.total_tokens,
        elapsed_ms = processing_time_ms,
        "{} component",
        operation.success_verb().to_lowercase(),
    );

    Ok(ChatOutcome {
        assistant_message,
        component,
        session: session.summary(),
    })
}

/// Append a synthetic assistant message describing a provider failure, so
/// the conversation keeps its continuity across an outage. Persisted
/// best-effort: the original error is what propagates to the caller.
async fn record_failure<S: SessionStore>(store: &S, session: &mut Session, err: &AtelierError) {
    session.record_message(ChatMessage::assistant(format!(
        "Failed to generate component: {err}"
    )));
    if let Err(save_err) = store.save_session(session).await {
        tracing::error!(session_id = %session.id, "failed to persist failure note: {save_err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::model::SessionSettings;
    use crate::storage::SqliteStore;
    use std::collections::VecDeque;

    /// Scripted completion backend: pops one canned reply per call and
    /// records the params each call was made with.
    #[derive(Default)]
    struct StubBackend {
        replies: std::sync::Mutex<VecDeque<Result<Completion>>>,
        calls: std::sync::Mutex<Vec<CompletionParams>>,
    }

    impl StubBackend {
        fn scripted(replies: Vec<Result<Completion>>) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies.into()),
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn reply(text: &str, tokens: u32) -> Result<Completion> {
            Ok(Completion {
                text: text.to_string(),
                total_tokens: Some(tokens),
            })
        }

        fn last_params(&self) -> CompletionParams {
            self.calls.lock().unwrap().last().unwrap().clone()
        }
    }

    impl CompletionBackend for StubBackend {
        async fn complete(
            &self,
            _messages: &[prompt::Message],
            params: &CompletionParams,
        ) -> Result<Completion> {
            self.calls.lock().unwrap().push(params.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("stub exhausted")
        }
    }

    struct Harness {
        store: SqliteStore,
        events: EventBus,
        locks: SessionLocks,
        generation: GenerationConfig,
        session_id: Uuid,
    }

    async fn harness() -> Harness {
        let store = SqliteStore::open_in_memory().unwrap();
        let session = Session::new(
            "alice".into(),
            "workbench".into(),
            SessionSettings::default(),
        );
        let session_id = session.id;
        store.save_session(&session).await.unwrap();
        Harness {
            store,
            events: EventBus::new(),
            locks: SessionLocks::new(),
            generation: GenerationConfig::default(),
            session_id,
        }
    }

    const BLUE_BUTTON: &str = r#"{
        "jsx": "const BlueButton = () => <button className=\"blue\">Go</button>;",
        "css": ".blue { background: #007bff; }",
        "componentName": "BlueButton",
        "description": "A blue button",
        "props": { "onClick": "() => void" }
    }"#;

    const RED_BUTTON: &str = r#"{
        "jsx": "const BlueButton = () => <button className=\"red\">Go</button>;",
        "css": ".red { background: #dc3545; }",
        "componentName": "RedButton",
        "description": "Now red",
        "props": {}
    }"#;

    #[tokio::test]
    async fn chat_then_refine_scenario() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![
            StubBackend::reply(BLUE_BUTTON, 120),
            StubBackend::reply(RED_BUTTON, 90),
        ]);

        let outcome = chat(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make a blue button".into(),
                images: vec![],
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.component.name, "BlueButton");
        assert_eq!(outcome.component.version, 1);
        assert_eq!(
            outcome.assistant_message.content,
            "Generated component: BlueButton"
        );

        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        assert_eq!(session.chat_history.len(), 2);
        assert_eq!(session.metadata.total_messages, 2);
        assert_eq!(session.metadata.total_tokens_used, 120);
        assert!(session.component_history.is_empty());

        let outcome = refine(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make it red".into(),
                images: vec![],
            },
        )
        .await
        .unwrap();

        // Refinement keeps the component's name even though the model
        // answered with a different one.
        assert_eq!(outcome.component.name, "BlueButton");
        assert_eq!(outcome.component.version, 2);

        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        assert_eq!(session.chat_history.len(), 4);
        assert_eq!(
            session.chat_history[2].content,
            "Refine component: make it red"
        );
        assert_eq!(session.component_history.len(), 1);
        assert_eq!(session.component_history[0].version, 1);
        assert_eq!(session.metadata.components_generated, 2);
    }

    #[tokio::test]
    async fn regenerate_replays_original_prompt_with_bumped_temperature() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![
            StubBackend::reply(BLUE_BUTTON, 100),
            StubBackend::reply(RED_BUTTON, 100),
        ]);

        chat(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make a blue button".into(),
                images: vec![],
            },
        )
        .await
        .unwrap();

        let outcome = regenerate(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
        )
        .await
        .unwrap();

        assert_eq!(outcome.component.version, 2);
        // Regenerated artifacts echo the original generation prompt.
        assert_eq!(
            outcome.component.generated_by.as_ref().unwrap().prompt,
            "make a blue button"
        );

        let params = llm.last_params();
        assert!((params.temperature - 0.8).abs() < f32::EPSILON);

        // Regeneration appends only the assistant turn.
        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        assert_eq!(session.chat_history.len(), 3);
    }

    #[tokio::test]
    async fn regenerate_without_component_is_invalid_state() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![]);

        let err = regenerate(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AtelierError::InvalidState(_)));
        // No mutation happened.
        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        assert!(session.chat_history.is_empty());
    }

    #[tokio::test]
    async fn refine_without_component_is_invalid_state() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![]);

        let err = refine(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make it pop".into(),
                images: vec![],
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AtelierError::InvalidState(_)));
        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        assert!(session.chat_history.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_preserves_conversation_continuity() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![Err(AtelierError::Provider(
            "openai completion error 500".into(),
        ))]);

        let err = chat(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make a table".into(),
                images: vec![],
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_provider_failure());

        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        // User message plus synthetic assistant failure note are persisted.
        assert_eq!(session.chat_history.len(), 2);
        assert_eq!(session.chat_history[0].content, "make a table");
        assert!(session.chat_history[1]
            .content
            .starts_with("Failed to generate component"));
        // No partial AI output was stored.
        assert!(session.current_component.is_none());
        assert_eq!(session.metadata.components_generated, 0);
    }

    #[tokio::test]
    async fn unparseable_reply_preserves_user_message() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![StubBackend::reply("", 5)]);

        let err = chat(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make a list".into(),
                images: vec![],
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AtelierError::MissingCode(_)));
        // Unlike a provider failure, no synthetic assistant message is
        // appended; only the user message survives.
        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        assert_eq!(session.chat_history.len(), 1);
        assert_eq!(session.chat_history[0].content, "make a list");
        assert_eq!(session.chat_history[0].role, crate::model::Role::User);
        assert!(session.current_component.is_none());
        assert_eq!(session.metadata.components_generated, 0);
    }

    #[tokio::test]
    async fn chat_emits_message_and_component_events() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![StubBackend::reply(BLUE_BUTTON, 10)]);
        let mut rx = h.events.subscribe(h.session_id);

        chat(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            h.session_id,
            "alice",
            ChatRequest {
                content: "make a blue button".into(),
                images: vec![],
            },
        )
        .await
        .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), SessionEvent::Message(_)));
        match rx.recv().await.unwrap() {
            SessionEvent::ComponentUpdated(component) => {
                assert_eq!(component.name, "BlueButton")
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![]);

        let err = chat(
            &h.store,
            &llm,
            &h.events,
            &h.locks,
            &h.generation,
            Uuid::now_v7(),
            "alice",
            ChatRequest {
                content: "hello".into(),
                images: vec![],
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AtelierError::NotFound(_)));
    }

    #[tokio::test]
    async fn version_sequence_is_strictly_increasing() {
        let h = harness().await;
        let llm = StubBackend::scripted(vec![
            StubBackend::reply(BLUE_BUTTON, 10),
            StubBackend::reply(RED_BUTTON, 10),
            StubBackend::reply(BLUE_BUTTON, 10),
            StubBackend::reply(RED_BUTTON, 10),
        ]);

        let req = |content: &str| ChatRequest {
            content: content.into(),
            images: vec![],
        };

        chat(&h.store, &llm, &h.events, &h.locks, &h.generation, h.session_id, "alice", req("one"))
            .await
            .unwrap();
        refine(&h.store, &llm, &h.events, &h.locks, h.session_id, "alice", req("two"))
            .await
            .unwrap();
        regenerate(&h.store, &llm, &h.events, &h.locks, &h.generation, h.session_id, "alice")
            .await
            .unwrap();
        let outcome = refine(&h.store, &llm, &h.events, &h.locks, h.session_id, "alice", req("three"))
            .await
            .unwrap();

        assert_eq!(outcome.component.version, 4);

        let session = h.store.get_session(h.session_id, "alice").await.unwrap();
        let versions: Vec<u32> = session
            .component_history
            .iter()
            .map(|c| c.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(session.metadata.components_generated, 4);
    }
}
