//! Prompt assembly for the completion call. Pure transformations: no I/O,
//! no session mutation.

use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, ComponentArtifact, Role};

/// How many prior chat turns are included for context.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One entry of the provider message list (`{role, content}` on the wire).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// System instructions fixing the required output shape and the style and
/// accessibility requirements for generated components.
pub const SYSTEM_PROMPT: &str = r#"You are an expert React component generator. Your task is to create React components based on user descriptions.

IMPORTANT GUIDELINES:
1. Always return valid JSX code that can be rendered in React
2. Use modern React patterns (functional components, hooks)
3. Include proper CSS for styling
4. Make components responsive and accessible
5. Use semantic HTML elements
6. Add ARIA attributes where appropriate
7. Components should be self-contained and reusable

RESPONSE FORMAT:
You must respond with a JSON object containing:
{
  "jsx": "// Your JSX component code here",
  "css": "/* Your CSS styles here */",
  "componentName": "ComponentName",
  "description": "Brief description of the component",
  "props": {
    "propName": "type description"
  }
}

The JSX should be a complete functional component that can be directly rendered.
The CSS should contain all necessary styles for the component, with class names matching the JSX structure.

EXAMPLE:
For "Create a blue button", respond with:
{
  "jsx": "import React from 'react';\n\nconst BlueButton = ({ children, onClick, disabled = false }) => {\n  return (\n    <button\n      className=\"blue-button\"\n      onClick={onClick}\n      disabled={disabled}\n    >\n      {children}\n    </button>\n  );\n};\n\nexport default BlueButton;",
  "css": ".blue-button {\n  background-color: #007bff;\n  color: white;\n  border: none;\n  padding: 12px 24px;\n  border-radius: 6px;\n  cursor: pointer;\n}\n\n.blue-button:disabled {\n  opacity: 0.6;\n  cursor: not-allowed;\n}",
  "componentName": "BlueButton",
  "description": "A responsive blue button component",
  "props": {
    "children": "React.ReactNode",
    "onClick": "() => void",
    "disabled": "boolean"
  }
}"#;

/// Message list for fresh generation: system instructions, then the last
/// `window` chat turns (oldest first), then the user request.
///
/// `history` is the conversation *before* the in-flight request; the
/// request itself goes in as the final user message.
pub fn build_generation(request: &str, history: &[ChatMessage], window: usize) -> Vec<Message> {
    let mut messages = Vec::with_capacity(window + 2);
    messages.push(Message::system(SYSTEM_PROMPT));
    messages.extend(history_window(history, window));
    messages.push(Message::user(request));
    messages
}

/// Message list for refinement: embeds the current component's JSX and CSS
/// verbatim and asks for a complete replacement, not a diff. Chat history
/// is deliberately not included; the component code is the context.
pub fn build_refinement(current: &ComponentArtifact, instruction: &str) -> Vec<Message> {
    let request = format!(
        "Current component:\n\nJSX:\n{jsx}\n\nCSS:\n{css}\n\nUser refinement request: {instruction}\n\nPlease modify the component according to the user's request and return the complete updated component in the same JSON format. Return the full replacement, not a diff.",
        jsx = current.jsx,
        css = current.css,
    );

    vec![Message::system(SYSTEM_PROMPT), Message::user(request)]
}

/// Message list for regeneration: replays the original generation prompt
/// with the same history window the original call used.
pub fn build_regeneration(
    original_prompt: &str,
    history: &[ChatMessage],
    window: usize,
) -> Vec<Message> {
    build_generation(original_prompt, history, window)
}

/// Temperature for a regeneration call: the session temperature nudged up
/// by `bump` to encourage variation, clamped to the documented [0, 2] range.
pub fn regeneration_temperature(base: f32, bump: f32) -> f32 {
    (base + bump).clamp(0.0, 2.0)
}

/// Fold image references into a request. Vision models are not wired up;
/// attached images only enhance the textual prompt.
pub fn enhance_with_images(request: &str, images: &[String]) -> String {
    if images.is_empty() {
        return request.to_string();
    }
    format!(
        "Based on the provided image{} and the following description: \"{request}\", create a React component that matches the design shown.",
        if images.len() > 1 { "s" } else { "" },
    )
}

fn history_window(history: &[ChatMessage], window: usize) -> impl Iterator<Item = Message> + '_ {
    let start = history.len().saturating_sub(window);
    history[start..].iter().map(|msg| Message {
        role: match msg.role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        },
        content: msg.content.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;
    use crate::parse::ParsedArtifact;

    fn artifact() -> ComponentArtifact {
        let mut session = crate::model::Session::new(
            "tester".into(),
            "prompts".into(),
            crate::model::SessionSettings::default(),
        );
        session
            .apply_generated(
                ParsedArtifact {
                    jsx: "const Card = () => <div className=\"card\" />;".into(),
                    css: ".card { padding: 8px; }".into(),
                    component_name: "Card".into(),
                    description: String::new(),
                    props: Default::default(),
                },
                uuid::Uuid::now_v7(),
                "make a card",
            )
            .clone()
    }

    #[test]
    fn generation_shape() {
        let history = vec![
            ChatMessage::user("make a button"),
            ChatMessage::assistant("Generated component: Button"),
        ];
        let messages = build_generation("make it bigger", &history, DEFAULT_HISTORY_WINDOW);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[2].role, MessageRole::Assistant);
        assert_eq!(messages.last().unwrap().content, "make it bigger");
    }

    #[test]
    fn generation_trims_history_to_window() {
        let history: Vec<ChatMessage> = (0..25)
            .map(|i| ChatMessage::user(format!("turn {i}")))
            .collect();
        let messages = build_generation("latest", &history, 10);

        // system + 10 history turns + request
        assert_eq!(messages.len(), 12);
        // Oldest-first: the window starts at turn 15.
        assert_eq!(messages[1].content, "turn 15");
        assert_eq!(messages[10].content, "turn 24");
    }

    #[test]
    fn refinement_embeds_component_verbatim() {
        let current = artifact();
        let messages = build_refinement(&current, "make it red");

        assert_eq!(messages.len(), 2);
        let body = &messages[1].content;
        assert!(body.contains(&current.jsx));
        assert!(body.contains(&current.css));
        assert!(body.contains("make it red"));
        assert!(body.contains("not a diff"));
    }

    #[test]
    fn regeneration_temperature_is_clamped() {
        assert!((regeneration_temperature(0.7, 0.1) - 0.8).abs() < f32::EPSILON);
        assert!((regeneration_temperature(1.95, 0.1) - 2.0).abs() < f32::EPSILON);
        assert!((regeneration_temperature(2.0, 0.1) - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn image_enhancement_rewrites_request() {
        assert_eq!(enhance_with_images("a card", &[]), "a card");
        let enhanced = enhance_with_images("a card", &["data:image/png;base64,xyz".into()]);
        assert!(enhanced.contains("provided image"));
        assert!(enhanced.contains("a card"));
    }

    #[test]
    fn message_serializes_with_lowercase_role() {
        let json = serde_json::to_string(&Message::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }
}
