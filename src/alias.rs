//! Model-name resolution: operator aliases from the database first, then the
//! built-in default tables, then pass-through for recognizable names.

use crate::db::DbActorHandle;
use tracing::warn;

/// Last-resort target when nothing else matches.
pub const FALLBACK_MODEL: &str = "gemini-3-flash";

/// Defaults for the OpenAI surface: native names pass through, legacy OpenAI
/// names map onto comparable upstream models.
const OPENAI_DEFAULTS: &[(&str, &str)] = &[
    ("claude-opus-4-5-thinking", "claude-opus-4-5-thinking"),
    ("claude-sonnet-4-5-thinking", "claude-sonnet-4-5-thinking"),
    ("gemini-3-flash", "gemini-3-flash"),
    ("gemini-3-pro-high", "gemini-3-pro-high"),
    ("gemini-3-pro-low", "gemini-3-pro-low"),
    ("gpt-oss-120b-medium", "gpt-oss-120b-medium"),
    ("gpt-4", "gemini-3-pro-high"),
    ("gpt-4-turbo", "gemini-3-pro-high"),
    ("gpt-4o", "gemini-3-flash"),
    ("gpt-3.5-turbo", "gemini-3-flash"),
];

/// Defaults for the Anthropic surface: legacy Claude names map to current
/// thinking models.
const CLAUDE_DEFAULTS: &[(&str, &str)] = &[
    ("claude-opus-4-5-thinking", "claude-opus-4-5-thinking"),
    ("claude-sonnet-4-5-thinking", "claude-sonnet-4-5-thinking"),
    ("claude-3-5-sonnet-20241022", "claude-sonnet-4-5-thinking"),
    ("claude-3-5-sonnet", "claude-sonnet-4-5-thinking"),
    ("claude-sonnet-4-20250514", "claude-sonnet-4-5-thinking"),
    ("claude-3-opus", "claude-opus-4-5-thinking"),
    ("claude-3-haiku", "gemini-3-flash"),
    ("claude-3-5-haiku", "gemini-3-flash"),
];

pub async fn resolve_openai(db: &DbActorHandle, requested: &str) -> String {
    resolve_with_defaults(db, requested, OPENAI_DEFAULTS).await
}

pub async fn resolve_claude(db: &DbActorHandle, requested: &str) -> String {
    resolve_with_defaults(db, requested, CLAUDE_DEFAULTS).await
}

/// Gemini-native requests consult operator aliases only and otherwise pass
/// through unchanged.
pub async fn resolve_gemini(db: &DbActorHandle, requested: &str) -> String {
    db_alias(db, requested)
        .await
        .unwrap_or_else(|| requested.to_string())
}

async fn resolve_with_defaults(
    db: &DbActorHandle,
    requested: &str,
    defaults: &[(&str, &str)],
) -> String {
    if let Some(target) = db_alias(db, requested).await {
        return target;
    }
    if let Some((_, target)) = defaults.iter().find(|(source, _)| *source == requested) {
        return (*target).to_string();
    }
    if looks_routable(requested) {
        return requested.to_string();
    }
    FALLBACK_MODEL.to_string()
}

async fn db_alias(db: &DbActorHandle, requested: &str) -> Option<String> {
    match db.get_alias(requested).await {
        Ok(target) => target,
        Err(e) => {
            warn!("model alias lookup failed for {requested}: {e}");
            None
        }
    }
}

fn looks_routable(model: &str) -> bool {
    let lowered = model.to_ascii_lowercase();
    ["gemini", "claude", "gpt"]
        .iter()
        .any(|family| lowered.contains(family))
}
