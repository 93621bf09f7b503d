//! Prompt files for batch runs.
//!
//! Recognized formats:
//! - plain text, one prompt per non-blank line; lines starting with `#` are
//!   comments
//! - a JSON array of strings
//! - a JSON object whose `prompts` key holds an array of strings

use std::path::Path;

use serde_json::Value;

use crate::error::EngineError;

/// Load prompts from `path`. `.json` files are parsed as JSON, everything
/// else as plain text.
pub fn load_prompts(path: &Path) -> Result<Vec<String>, EngineError> {
    let invalid = |reason: String| EngineError::InvalidPrompts {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let prompts = if is_json {
        parse_json_prompts(&text).map_err(invalid)?
    } else {
        parse_text_prompts(&text)
    };

    if prompts.is_empty() {
        return Err(invalid("no prompts found".to_string()));
    }
    Ok(prompts)
}

pub fn parse_text_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn parse_json_prompts(text: &str) -> Result<Vec<String>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("prompts") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("'prompts' must be an array of strings".to_string()),
            None => return Err("expected a 'prompts' key".to_string()),
        },
        _ => return Err("expected an array or an object with 'prompts'".to_string()),
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Ok(s)),
            other => Some(Err(format!("prompt {i} is not a string: {other}"))),
        })
        .collect()
}
