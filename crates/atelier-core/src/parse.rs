//! Turning a raw completion reply into a component artifact.
//!
//! Models are instructed to answer with a single JSON object (see
//! [`crate::prompt`]), but they routinely wrap it in markdown fences or
//! answer with prose plus code blocks instead. `parse` is therefore a
//! best-effort total function: for any input it either produces a
//! [`ParsedArtifact`] with non-empty `jsx`, or fails with
//! [`AtelierError::MissingCode`] — the one outcome that cannot be
//! defaulted, because an artifact without renderable code is not a
//! component.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AtelierError, Result};

/// A normalized component artifact extracted from completion text.
/// Every field is present: optional wire fields have been defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArtifact {
    pub jsx: String,
    pub css: String,
    pub component_name: String,
    pub description: String,
    pub props: BTreeMap<String, String>,
}

pub const DEFAULT_COMPONENT_NAME: &str = "GeneratedComponent";

/// The provider-side shape: camelCase keys, everything but `jsx` optional.
#[derive(Debug, Deserialize)]
struct WireArtifact {
    #[serde(default)]
    jsx: Option<String>,
    #[serde(default)]
    css: Option<String>,
    #[serde(default, rename = "componentName", alias = "component_name")]
    component_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    props: Option<serde_json::Map<String, Value>>,
}

fn jsx_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:jsx?|tsx?)[ \t]*\n(.*?)```").unwrap())
}

fn css_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```css[ \t]*\n(.*?)```").unwrap())
}

fn json_fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json[ \t]*\n(.*?)```").unwrap())
}

/// Parse raw completion text into a [`ParsedArtifact`].
///
/// Resolution order:
/// 1. Strict JSON decode of the whole text.
/// 2. Strict JSON decode of a fenced ```json block, if present.
/// 3. Fenced code-block extraction: a `jsx`/`tsx`/`js`/`ts` block becomes
///    `jsx` and a `css` block becomes `css`; with no matching code fence
///    the entire text is taken as `jsx`.
///
/// Fails only with [`AtelierError::MissingCode`], when no path yields
/// non-empty jsx.
pub fn parse(raw: &str) -> Result<ParsedArtifact> {
    let trimmed = raw.trim();

    if let Ok(wire) = serde_json::from_str::<WireArtifact>(trimmed) {
        return normalize(wire);
    }

    if let Some(caps) = json_fence_re().captures(trimmed) {
        if let Ok(wire) = serde_json::from_str::<WireArtifact>(caps[1].trim()) {
            if wire.jsx.as_deref().is_some_and(|j| !j.trim().is_empty()) {
                return normalize(wire);
            }
        }
    }

    let jsx = match jsx_fence_re().captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    };
    let css = css_fence_re()
        .captures(trimmed)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default();

    if jsx.is_empty() {
        return Err(AtelierError::MissingCode(
            "completion contained no JSX code".into(),
        ));
    }

    Ok(ParsedArtifact {
        jsx,
        css,
        component_name: DEFAULT_COMPONENT_NAME.to_string(),
        description: String::new(),
        props: BTreeMap::new(),
    })
}

fn normalize(wire: WireArtifact) -> Result<ParsedArtifact> {
    let jsx = wire.jsx.unwrap_or_default();
    if jsx.trim().is_empty() {
        return Err(AtelierError::MissingCode(
            "completion JSON is missing JSX code".into(),
        ));
    }

    let component_name = wire
        .component_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COMPONENT_NAME.to_string());

    Ok(ParsedArtifact {
        jsx,
        css: wire.css.unwrap_or_default(),
        component_name,
        description: wire.description.unwrap_or_default(),
        props: wire.props.map(normalize_props).unwrap_or_default(),
    })
}

/// Prop values are usually type-description strings, but models sometimes
/// emit nested objects; stringify anything that is not already a string.
fn normalize_props(props: serde_json::Map<String, Value>) -> BTreeMap<String, String> {
    props
        .into_iter()
        .map(|(name, value)| {
            let description = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, description)
        })
        .collect()
}
