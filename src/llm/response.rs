//! Defensive parsing of chat-completion replies
//!
//! The endpoint answers with an OpenAI-style envelope whose
//! `choices[0].message.content` is itself expected to be a JSON object with a
//! string `summary` and a string array `tags`. Both layers are checked.

use crate::llm::{Enrichment, LlmError};
use serde_json::Value;

/// Rough characters-per-token ratio used for the input budget
pub const CHARS_PER_TOKEN: usize = 4;

/// Parses a raw response body into an [`Enrichment`]
pub fn parse_chat_response(body: &str) -> Result<Enrichment, LlmError> {
    let content = chat_content(body)?;
    parse_enrichment(strip_code_fence(&content))
}

/// Extracts `choices[0].message.content` from a response body
pub fn chat_content(body: &str) -> Result<String, LlmError> {
    let envelope: Value = serde_json::from_str(body)
        .map_err(|e| LlmError::Malformed(format!("response is not JSON: {}", e)))?;

    if let Some(error) = envelope.get("error") {
        return Err(LlmError::Malformed(format!("endpoint returned error: {}", error)));
    }

    envelope
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".to_string()))
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````)
pub fn strip_code_fence(content: &str) -> &str {
    let mut inner = content.trim();
    if let Some(rest) = inner.strip_prefix("```") {
        inner = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = inner.strip_suffix("```") {
        inner = rest;
    }
    inner.trim()
}

/// Parses the inner `{"summary": ..., "tags": [...]}` object
///
/// Both keys are required; `tags` must contain only strings.
pub fn parse_enrichment(content: &str) -> Result<Enrichment, LlmError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| LlmError::Malformed(format!("content is not JSON: {}", e)))?;

    let summary = value
        .get("summary")
        .ok_or_else(|| LlmError::Malformed("missing 'summary'".to_string()))?
        .as_str()
        .ok_or_else(|| LlmError::Malformed("'summary' is not a string".to_string()))?
        .to_string();

    let tags = value
        .get("tags")
        .ok_or_else(|| LlmError::Malformed("missing 'tags'".to_string()))?
        .as_array()
        .ok_or_else(|| LlmError::Malformed("'tags' is not an array".to_string()))?
        .iter()
        .map(|tag| {
            tag.as_str()
                .map(str::to_string)
                .ok_or_else(|| LlmError::Malformed(format!("non-string tag: {}", tag)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Enrichment { summary, tags })
}

/// Keeps the leading part of `text` that fits in `max_tokens`
///
/// Cuts on a character boundary.
pub fn truncate_to_budget(text: &str, max_tokens: usize) -> &str {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
